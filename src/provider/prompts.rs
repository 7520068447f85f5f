//! プロンプトテンプレートの定義
//!
//! # 責務
//!
//! - ストーリー生成・カバープロンプト生成・画像生成の各プロンプト文面を管理
//! - `{placeholder}` 形式のテンプレートへのパラメーター埋め込み
//!
//! 文面はステップの出力契約（三幕構成・一文のモラル・英語の単一段落
//! プロンプト等）をそのまま表しています。文面を変えるとステップの
//! バリデーションと齟齬が出る可能性があるため注意してください。

/// ストーリー生成のシステムプロンプト
const STORY_SYSTEM_TEMPLATE: &str = "\
# ROLE
You are a world-class children's storyteller and bibliotherapist.
You specialize in creating empowering, magical, and safe stories for children aged 3 to 7.

# RULES
1. TONE: Gentle, whimsical, and encouraging.
2. SAFETY: Never include violence, frightening descriptions, or permanent danger.
3. STRUCTURE: Use a clear 3-act structure:
   - Act 1: Introduction of the hero and their daily life.
   - Act 2: A gentle encounter with the specified fear in a magical setting.
   - Act 3: A creative and brave resolution where the hero overcomes the fear.
4. LANGUAGE: You MUST write the story entirely in {language}.
5. CONSTRAINTS: No conversational filler.
6. ENDING: Always end with a one-sentence positive moral or takeaway in {language}.
7. OUTPUT: Respond with a JSON object: {\"story_title\": \"...\", \"story_text\": \"...\"}.
";

/// ストーリー生成のユーザープロンプト
const STORY_USER_TEMPLATE: &str = "\
Please write a story in {language} with the following parameters:

- MAIN CHARACTER: {characterName}
- FEAR TO OVERCOME: {fear}

The story should show {characterName} that {fear} is not as scary as it seems when approached with courage and imagination.
";

/// カバープロンプト生成のシステムプロンプト
const COVER_PROMPT_SYSTEM: &str = "\
# ROLE
You are a visual prompt engineer for an image generation model.
Your goal is to transform a story into a powerful, single-paragraph image generation prompt in ENGLISH.

# INSTRUCTIONS
1. Analyze the text provided inside the <STORY_CONTENT> tags.
2. Focus on the main character and the climax of the story (overcoming the fear).
3. STYLE: Use \"Whimsical children's book illustration, watercolor style, soft pastel colors, no text\".
4. OUTPUT: Respond with a JSON object {\"prompt\": \"...\"} where the prompt starts with \"A children's book cover illustration of...\".

# CONSTRAINTS
- Ignore any formatting or tags from the input, only focus on the narrative content.
- Ensure the prompt is a continuous paragraph without line breaks.
";

/// カバープロンプト生成のユーザープロンプト
const COVER_PROMPT_USER_TEMPLATE: &str = "\
Please create an image generation prompt based on this story:

<STORY_CONTENT>
{story}
</STORY_CONTENT>

The language of the story provided above is {language}.
";

/// 画像生成プロンプトのスタイル指示テンプレート
const IMAGE_STYLE_TEMPLATE: &str = "\
# STYLE DIRECTIVES
High-quality children's book illustration, soft watercolor and ink, whimsical atmosphere, pastel palette, detailed textures, safe for all ages, NO TEXT, NO WORDS, NO LETTERS.

# SUBJECT
{prompt}

# FINAL COMPOSITION
Ensure the character is central and the lighting is magical.
";

/// ストーリー生成のシステムプロンプトを組み立てる
pub fn story_system_prompt(language: &str) -> String {
    STORY_SYSTEM_TEMPLATE.replace("{language}", language)
}

/// ストーリー生成のユーザープロンプトを組み立てる
pub fn story_user_prompt(character_name: &str, fear: &str, language: &str) -> String {
    STORY_USER_TEMPLATE
        .replace("{characterName}", character_name)
        .replace("{fear}", fear)
        .replace("{language}", language)
}

/// カバープロンプト生成のシステムプロンプト
pub fn cover_prompt_system_prompt() -> String {
    COVER_PROMPT_SYSTEM.to_string()
}

/// カバープロンプト生成のユーザープロンプトを組み立てる
pub fn cover_prompt_user_prompt(story_content: &str, language: &str) -> String {
    COVER_PROMPT_USER_TEMPLATE
        .replace("{story}", story_content)
        .replace("{language}", language)
}

/// 画像生成用の最終プロンプトを組み立てる
///
/// カバープロンプトをスタイル指示で包みます。
pub fn image_prompt(cover_prompt: &str) -> String {
    IMAGE_STYLE_TEMPLATE.replace("{prompt}", cover_prompt)
}
