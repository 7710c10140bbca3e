/// Asks a vision model for the structure of a hand-drawn concept map as JSON.
pub const STRUCTURE_PROMPT: &str = r#"You are reading a hand-drawn concept map. Describe its structure as plainly as possible.

Concepts are the boxes, circles or other closed shapes that contain text.
- Give each one a short id: c1, c2, c3, ...
- Use the exact text written inside the shape as its name.

Relationships are the arrows or lines joining two concepts.
- Follow the arrow direction from source to target.
- If text is written on the line, use it as the label; otherwise use "relates to".

Keep the result flat: only direct connections, no nesting.

Reply with this JSON object and nothing else:
{
  "concepts": [
    {"id": "c1", "name": "text in the shape", "description": "short description or empty string"}
  ],
  "relationships": [
    {"source": "c1", "target": "c2", "label": "relates to"}
  ],
  "structure": {"type": "network", "root": "c1"}
}"#;

/// Asks for a plain-text rendition of the same drawing.
pub const DESCRIPTION_PROMPT: &str = r#"Write a plain-text description of the concepts and direct connections in this concept map, in this layout:

Digitized concept map with concepts: <every concept name, comma separated>

Concepts:
<concept name>: <short description, or the name again>

Relationships:
<concept name> relates to <concept name>

Use "relates to" unless an arrow carries different text. Write the real names in place of the angle-bracket placeholders."#;
