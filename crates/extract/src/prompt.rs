pub fn build_triple_prompt(chunk_text: &str) -> String {
    format!(
        r#"Extract all key conceptual triples (Subject | Relation | Object) from the following text.

INSTRUCTIONS:
1. Each triple connects two concepts with a short relation phrase
2. Return one triple per line, exactly in the format shown below
3. Do not number the lines, do not add explanations or markdown

FORMAT:
Subject | Relation | Object

TEXT:
"""{}"""

TRIPLES:"#,
        chunk_text
    )
}

pub fn build_key_concepts_prompt(text: &str) -> String {
    format!(
        r#"List the key concepts of the following text.

INSTRUCTIONS:
1. Keep noun phrases, technical terms, named entities and domain keywords
2. Skip generic or filler words such as "process", "thing", "something", "the bonds"
3. When one idea appears in several phrasings, keep the most common one only
4. Do not count occurrences; frequencies are computed separately

Respond with a JSON array of strings and nothing else, for example:
["photosynthesis", "carbon dioxide", "ATP"]

TEXT:
"""{}"""

KEY CONCEPTS:"#,
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_concepts_prompt_asks_for_a_json_array() {
        let prompt = build_key_concepts_prompt("ATP stores energy.");
        assert!(prompt.contains("\"\"\"ATP stores energy.\"\"\""));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn prompt_embeds_chunk() {
        let prompt = build_triple_prompt("Water boils at 100 degrees.");
        assert!(prompt.contains("\"\"\"Water boils at 100 degrees.\"\"\""));
        assert!(prompt.contains("Subject | Relation | Object"));
    }
}
