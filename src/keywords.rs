/// Fixed instruction for the generative service: noun-only retrieval
/// keywords, comma separated, at most three characters each, about 30 of
/// them, category terms included, language chosen per content.
const PROMPT_INSTRUCTION: &str = "請根據以下新聞描述，生成適合檢索的**名詞**關鍵字，使用逗號分隔。關鍵字還必須包含這些新聞的類別。關鍵字必須是名詞，最多三個字。產生約30個關鍵字，請依據內容決定要英文還是繁體中文：";

pub fn build_prompt(description: &str) -> String {
    format!("{}\n{}", PROMPT_INSTRUCTION, description)
}

/// Normalize raw model output into the final keyword string: unify
/// full-width commas, split on comma, strip all embedded whitespace per
/// token, drop tokens that end up empty, rejoin with a standard comma.
pub fn normalize_keywords(raw: &str) -> String {
    raw.replace('，', ",")
        .split(',')
        .map(|token| token.split_whitespace().collect::<String>())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
