use crate::detection::CompanyDirectory;

/// Neutralizes chat-template control tokens in text embedded into a prompt.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("```", "'''")
}

/// Prompt asking the service which known company issued the attached document.
pub fn classification_prompt(directory: &CompanyDirectory) -> String {
    let mut companies = String::new();
    for company in directory.companies() {
        companies.push_str(&format!(
            "- id: {}, name: {}",
            sanitize_for_prompt(&company.id),
            sanitize_for_prompt(&company.name)
        ));
        if !company.aliases.is_empty() {
            let aliases: Vec<String> = company
                .aliases
                .iter()
                .map(|a| sanitize_for_prompt(a))
                .collect();
            companies.push_str(&format!(", aliases: {}", aliases.join(", ")));
        }
        if !company.unique_identifiers.is_empty() {
            let ids: Vec<String> = company
                .unique_identifiers
                .iter()
                .map(|a| sanitize_for_prompt(a))
                .collect();
            companies.push_str(&format!(", identifiers: {}", ids.join(", ")));
        }
        companies.push('\n');
    }

    format!(
        "You classify scanned purchase order documents by the company that issued them.\n\
         Known companies:\n{companies}\n\
         Read the attached document and answer with a single JSON object and nothing else:\n\
         {{\"company_id\": \"<id from the list or null>\", \"confidence\": <number between 0 and 1>, \
         \"reasoning\": \"<short explanation>\", \"found_keywords\": [\"<text that identified the company>\"]}}\n\
         Use null for company_id if the issuer is not in the list."
    )
}

/// Prompt asking for the plain text of the attached document.
pub fn extraction_prompt() -> &'static str {
    "Extract all text from the attached document exactly as printed. \
     Return plain text only, without commentary or formatting."
}

/// Prompt asking for the structured work order of a document from a known company.
pub fn work_order_prompt(company_id: &str, company_name: &str) -> String {
    format!(
        "The attached purchase order was issued by {name} (id {id}).\n\
         Produce a work order from it with these sections, one per line:\n\
         Customer, Order number, Order date, Delivery date, Delivery address, \
         Line items (article number, description, quantity, unit), Notes.\n\
         Write \"-\" for any field the document does not contain. Return plain text only.",
        name = sanitize_for_prompt(company_name),
        id = sanitize_for_prompt(company_id),
    )
}
