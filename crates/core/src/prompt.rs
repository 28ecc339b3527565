//! Prompt templates and `{{name}}` placeholder substitution.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Matches `{{name}}` placeholders where `name` is made of word characters.
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Substitute every `{{name}}` placeholder in `template`.
///
/// Names missing from `vars` are replaced with a visible
/// `{{Undefined variable: name}}` marker. Substituted values are inserted
/// verbatim and never re-scanned for placeholders.
pub fn format_prompt<V: AsRef<str>>(template: &str, vars: &HashMap<&str, V>) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => value.as_ref().to_string(),
                None => format!("{{{{Undefined variable: {}}}}}", name),
            }
        })
        .into_owned()
}

/// Asks for the document's topics, each followed by the first words of its
/// section. Placeholder: `content`.
pub const EXTRACT_TOPICS_TEMPLATE: &str = "\
You are an expert document analyst.

Analyze the following document and extract **all meaningful topics or subtopics**, following these rules:

1. Extract any section, paragraph, or idea that could be shown as its own slide.
2. Topics should reflect distinct concepts, domains, or shifts in the document focus.
3. Aim to extract 5-7 key topics minimum unless the document is extremely short.
4. Avoid repeating topics unless clearly expanded upon later.
5. List topics in the order they appear in the document.

Provide the output in the following format:
**<key topic 1>**
first ten words of the section or theme that the key topic 1 represents
**<key topic 2>**
first ten words of the section or theme that the key topic 2 represents

Copy the first ten words exactly as they appear in the document.
Do NOT add any explanations.

Now extract from the document below:
Document:
'''
{{content}}
'''
";

/// Asks for titled bullet slides covering one document portion.
/// Placeholders: `topic`, `contentSegment`.
pub const SLIDE_CONTENT_TEMPLATE: &str = "\
You will be given a key topic and a document portion which provides detail about the key topic. Your task is to create slides based on the document portion.

Guidelines:
- The number of slides can be 1-5, depending on the amount of **non-repetitive information** in the document portion.
- **Make sure the information on all the slides under the same topic is non-repetitive.**
- Present slides in the order that the information appears in the document.
- Each slide should have 4-6 concise bullet points, each containing a single key idea or fact.
- Use concise phrases or short sentences for bullet points.
- **Do not include additional commentary, explanations, or \"Note:\" sections. Provide only the slide titles and bullet points.**

Output Format:
**paste slide title here**
paste point 1 here
paste point 2 here
paste point 3 here

Inputs:
Key Topic: '''{{topic}}'''

Document portion:'''
{{contentSegment}}
'''

**Output only the slide content** (titles + bullet points). **Do not add any extra notes or remarks.**
";

/// Asks for a JSON array of slides that may reference images and tables.
/// Placeholders: `textContent`, `imagePaths`, `tableData`.
pub const STRUCTURED_SLIDES_TEMPLATE: &str = "\
You are generating a presentation from a document.
Return the slides as a JSON array.
Each slide should include:

{
  \"title\": \"Slide title\",
  \"text\": \"• bullet 1\\n• bullet 2\",
  \"image\": \"path/to/image.png\",
  \"table\": [[\"Header 1\", \"Header 2\"], [\"Row 1 Col 1\", \"Row 1 Col 2\"]]
}

Document text:
{{textContent}}

Available images with context:
{{imagePaths}}

Available table data:
{{tableData}}

Guidelines:
- Each slide should have 4-6 concise bullet points, each containing a single key idea or fact.
- The number of slides should be determined by the document's topics and subtopics, not by the number of images.
- Give every slide a unique, descriptive title; avoid \"Part 1\" or \"continued\".
- If a relevant table is available, include it in the \"table\" field; otherwise use an empty list.
- Do not repeat the contents of a table in the bullet points.
- Assign each image to at most one slide. If no suitable image is available, leave \"image\" empty.
- Prefer images whose context matches the slide title.
- Output must be a valid JSON array and nothing else.
";
