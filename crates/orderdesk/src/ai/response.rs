use serde::Deserialize;

/// Returns the outermost `{...}` span of a free-text reply, ignoring code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// The JSON object the classification prompt asks for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassificationReply {
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub found_keywords: Vec<String>,
}

impl ClassificationReply {
    pub fn parse(text: &str) -> Result<Self, String> {
        let json = extract_json_object(text).ok_or_else(|| "no JSON object in reply".to_string())?;
        let mut reply: ClassificationReply =
            serde_json::from_str(json).map_err(|e| e.to_string())?;
        if !reply.confidence.is_finite() {
            reply.confidence = 0.0;
        }
        reply.confidence = reply.confidence.clamp(0.0, 1.0);
        reply.company_id = reply
            .company_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("null"));
        Ok(reply)
    }
}
