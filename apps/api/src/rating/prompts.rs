// All model prompt constants for the rating engine.

/// Vision instruction for highlight screenshots. Replace `{genres}` before sending.
pub const HIGHLIGHT_CAPTION_TEMPLATE: &str = "Describe this video game screenshot in THREE sentences (genres: {genres}), focusing on key gameplay elements, characters, environment, and any unique features that stand out.";

/// Vision instruction for the capsule image.
pub const CAPSULE_CAPTION_PROMPT: &str = "This is a video game steam page capsule image, What's the title? What's the theme of the background like? Describe it in two short and concise sentences.";

/// Worked example embedded in the rating prompt next to the description checklist.
pub const EXAMPLE_EVALUATION: &str = r#"Description context:
Parse-O-Rhythm is a rhythm game about slashing errors in files to fix them. Slice and dice your way through files with nothing but the mouse and two buttons!
Checklist:
- Does it mention gameplay verbs?
- Does it have a hook?
- Does it mention at least one game genre?
- Is it grammatically correct?
Evaluation Results:
{
  "description": {
    "score": "5",
    "actionablefeedback": "",
    "strengths": "The description effectively uses gameplay verbs such as 'slashing' and 'slice and dice,' includes a strong hook, mentions the rhythm game genre, and is grammatically correct. It concisely communicates the core gameplay while being engaging."
  }
}"#;

/// Rating prompt template. Replace `{description}`, `{example}`, `{about}`, `{genres}`,
/// `{highlight_captions}` and `{capsule_caption}` before sending.
pub const RATING_PROMPT_TEMPLATE: &str = r#"As a Steam page rating expert, you are tasked with evaluating a Steam page's content separated into components. Please follow the directions and rate the components on a scale of 1-5 based solely on the checklist criteria below.

1. Use the following scoring system:
  - 5 points: All checklist criteria are met for the component.
  - 4 points: Most checklist criteria are met for the component (3 out of 4, or 2 out of 3 for 3-item lists).
  - 3 points: About half of the checklist criteria are met (approximately 50% or 2 out of 4).
  - 2 points: Some checklist criteria are met (approximately 25% or 1 out of 4).
  - 1 point: Very few checklist criteria are met.

2. Evaluate each of the components below based on each individual context:

Description context:
{description}
Checklist:
- Does it mention gameplay verbs?
- Does it have a hook?
- Does it mention at least one game genre?
- Is it grammatically correct?
Here is an example evaluation:
{example}

AboutThisGame context:
{about}
Checklist:
- Does it mention key features and mechanics?
- Does it explain what you do in the game and what the gameplay is like?
- Does it contain a call to action regarding directing players to engage with the game?
- Does it briefly explain the game's core concept or unique selling point?

Genres context:
Genres: {genres}
Checklist:
- Do the listed genres align with the game's Description component?
- Do the listed genres align with the game's AboutThisGame component?
- Do the listed genres mention any of the following genres: {genres}

HighlightImage context (image to text descriptions, so be flexible and don't grade it harshly):
{highlight_captions}
Checklist:
- Are the images context described well?
- Are the descriptions concise and straight to the point?
- Are there elements in the context that would intrigue potential players?
- Does the context hint at the game's core mechanics or unique features?
- Do the images context collectively showcase various aspects of the game (e.g., environment, characters, gameplay)?

CapsuleImage context:
{capsule_caption}
Checklist:
- Does it have the game title in the context text?
- Does it show a theme or atmosphere in the background?

3. Please provide your evaluation in the following JSON format for the output:
{
  "description": {"score": "", "actionablefeedback": "", "strengths": ""},
  "aboutThisGame": {"score": "", "actionablefeedback": "", "strengths": ""},
  "genres": {"score": "", "actionablefeedback": "", "strengths": ""},
  "highlightImageCaptions": {"score": "", "actionablefeedback": "", "strengths": ""},
  "capsuleImageCaption": {"score": "", "actionablefeedback": "", "strengths": ""}
}

4. Remember to adhere to the rules below:
  - The score should be based solely on the checklist criteria.
  - The score must be a single number from 1 to 5.
  - For components with 3 or 4 checklist items, a score of 4 is awarded if 2 or 3 criteria are met.
  - Provide actionable feedback for any unmet criteria.
  - Sentences should be at least 60 characters long and include specific suggestions for improvement."#;

/// Substitutes `{name}` placeholders in one left-to-right pass.
/// Substituted text is never rescanned; unknown placeholders and stray braces are kept.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let substitution = tail[1..].find('}').and_then(|end| {
            let name = &tail[1..=end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end + 2))
        });

        match substitution {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
