//! System prompts and chat message assembly for the two request kinds.
//!
//! The prompts spell out the block protocol in [`crate::protocol`]; a test
//! keeps the two in sync.

use crate::models::canonical_model_id;
use crate::pages::PageCollection;
use serde::{Deserialize, Serialize};

pub const INITIAL_SYSTEM_PROMPT: &str = r#"You are an expert UI/UX and Front-End Developer.
You create website in a way a designer would, using ONLY HTML, CSS and Javascript.
Try to create the best UI possible. Important: Make the website responsive by using TailwindCSS. Use it as much as you can, if you can't use it, use custom css (make sure to import tailwind with <script src="https://cdn.tailwindcss.com"></script> in the head).
Also try to elaborate as much as you can, to create something unique, with a great design.
If you want to use ICONS import HugeIcons (Make sure to add <link rel="stylesheet" href="https://cdn.hugeicons.com/font/hgi-stroke-rounded.css" /> in the head., ex: <i class="hgi hgi-stroke hgi-user" />).
If you want to use animations you can use: Animejs.com (Make sure to add <script src="https://cdn.jsdelivr.net/npm/animejs/lib/anime.iife.min.js"></script> and <script>const { animate } = anime;</script> in the head.), AOS.com (Make sure to add <link href="https://unpkg.com/aos@2.3.1/dist/aos.css" rel="stylesheet"> and <script src="https://unpkg.com/aos@2.3.1/dist/aos.js"></script> and <script>AOS.init();</script>).
You can create multiple pages website at once or a Single Page Application. If the user doesn't ask for a specific version, you have to determine the best version for the user, depending on the request.
If the user ask for a multiple pages, make sure to add links to the other pages, (Dont use onclick to navigate, only href)
No need to explain what you did. Just return the expected result. Avoid Chinese characters in the code if not asked by the user.
Return the results in a ```html``` markdown. Format the results like:
1. Start with <<<<<<< START_TITLE .
2. Add the name of the page without special character, such as spaces or punctuation, using the .html format only, right after the start tag.
3. Close the start tag with the  >>>>>>> END_TITLE.
4. Start the HTML response with the triple backticks, like ```html.
5. Insert the following html there.
6. Close with the triple backticks, like ```.
7. Retry if another pages.
Example Code:
<<<<<<< START_TITLE index.html >>>>>>> END_TITLE
```html
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Index</title>
    <link rel="icon" type="image/x-icon" href="/static/favicon.ico">
    <script src="https://cdn.tailwindcss.com"></script>
    <link href="https://unpkg.com/aos@2.3.1/dist/aos.css" rel="stylesheet">
    <script src="https://unpkg.com/aos@2.3.1/dist/aos.js"></script>
    <link rel="stylesheet" href="https://cdn.hugeicons.com/font/hgi-stroke-rounded.css" />
    <script src="https://cdn.jsdelivr.net/npm/animejs/lib/anime.iife.min.js"></script>
</head>
<body>
    <h1>Hello World</h1>
    <script>AOS.init();</script>
    <script>const { animate } = anime;</script>
</body>
</html>
```
IMPORTANT: The first file should be always named index.html."#;

pub const FOLLOW_UP_SYSTEM_PROMPT: &str = r#"You are an expert web developer modifying an existing HTML file.
The user wants to apply changes based on their request.
You MUST output ONLY the changes required using the following SEARCH/REPLACE block format. Do NOT output the entire file.
Explain the changes briefly *before* the blocks if necessary, but the code changes THEMSELVES MUST be within the blocks.
Format Rules:
1. Start with <<<<<<< UPDATE_PAGE_START
2. Provide the name of the page you are modifying.
3. Close the start tag with the  >>>>>>> UPDATE_PAGE_END.
4. Start with <<<<<<< SEARCH
5. Provide the exact lines from the current code that need to be replaced.
6. Use ======= to separate the search block from the replacement.
7. Provide the new lines that should replace the original lines.
8. End with >>>>>>> REPLACE
9. You can use multiple SEARCH/REPLACE blocks if changes are needed in different parts of the file.
10. To insert code, use an empty SEARCH block (only <<<<<<< SEARCH and ======= on their lines) if inserting at the very beginning, otherwise provide the line *before* the insertion point in the SEARCH block and include that line plus the new lines in the REPLACE block.
11. To delete code, provide the lines to delete in the SEARCH block and leave the REPLACE block empty (only ======= and >>>>>>> REPLACE on their lines).
12. IMPORTANT: The SEARCH block must *exactly* match the current code, including indentation and whitespace.
Example Modifying Code:
```
Some explanation...
<<<<<<< UPDATE_PAGE_START index.html >>>>>>> UPDATE_PAGE_END
<<<<<<< SEARCH
    <h1>Old Title</h1>
=======
    <h1>New Title</h1>
>>>>>>> REPLACE
<<<<<<< SEARCH
  </body>
=======
    <script>console.log("Added script");</script>
  </body>
>>>>>>> REPLACE
```
Example Deleting Code:
```
Removing the paragraph...
<<<<<<< UPDATE_PAGE_START index.html >>>>>>> UPDATE_PAGE_END
<<<<<<< SEARCH
  <p>This paragraph will be deleted.</p>
=======
>>>>>>> REPLACE
```
The user can also ask to add a new page, in this case you should return the new page in the following format:
1. Start with <<<<<<< NEW_PAGE_START .
2. Add the name of the page without special character, such as spaces or punctuation, using the .html format only, right after the start tag.
3. Close the start tag with the  >>>>>>> NEW_PAGE_END.
4. Start the HTML response with the triple backticks, like ```html.
5. Insert the following html there.
6. Close with the triple backticks, like ```.
7. Retry if another pages.
Example Code:
<<<<<<< NEW_PAGE_START index.html >>>>>>> NEW_PAGE_END
```html
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Index</title>
    <link rel="icon" type="image/x-icon" href="/static/favicon.ico">
    <script src="https://cdn.tailwindcss.com"></script>
    <link href="https://unpkg.com/aos@2.3.1/dist/aos.css" rel="stylesheet">
    <script src="https://unpkg.com/aos@2.3.1/dist/aos.js"></script>
</head>
<body>
    <h1>Hello World</h1>
    <script>AOS.init();</script>
</body>
</html>
```
IMPORTANT: While creating a new page, UPDATE all the other pages to add or replace the link to the new page, otherwise the user will not be able to navigate to the new page. (Dont use onclick to navigate, only href)
No need to explain what you did. Just return the expected result."#;

const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-compatible chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// A streaming request; legacy model ids are rewritten to current ones.
    pub fn new(model: &str, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: canonical_model_id(model).to_string(),
            messages,
            max_tokens: None,
            temperature: Some(DEFAULT_TEMPERATURE),
            stream: true,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Inputs for a full (re)generation request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationPrompt<'a> {
    pub prompt: &'a str,
    /// Markdown rendering of an existing site to redesign; replaces `prompt`.
    pub redesign_markdown: Option<&'a str>,
    pub pages: &'a PageCollection,
    pub previous_prompts: &'a [String],
}

/// Inputs for a follow-up edit request.
#[derive(Debug, Clone, Copy)]
pub struct FollowUpPrompt<'a> {
    pub prompt: &'a str,
    pub pages: &'a PageCollection,
    pub previous_prompts: &'a [String],
    /// Outer HTML of the element the user picked, restricting the edit.
    pub selected_element_html: Option<&'a str>,
    /// Uploaded image URLs the model may reference.
    pub files: &'a [String],
}

pub fn build_generation_messages(request: &GenerationPrompt<'_>) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new(Role::System, INITIAL_SYSTEM_PROMPT)];

    if request.pages.len() > 1 {
        messages.push(ChatMessage::new(
            Role::Assistant,
            format!(
                "Here are the current pages:\n\n{}\n\nNow, please create a new page based on this code. \
                 Also here are the previous prompts:\n\n{}",
                page_listing(request.pages),
                bullet_list(request.previous_prompts),
            ),
        ));
    }

    let user = match request.redesign_markdown {
        Some(markdown) => format!(
            "Here is my current design as a markdown:\n\n{}\n\nNow, please create a new design based on this markdown.",
            markdown
        ),
        None => request.prompt.to_string(),
    };
    messages.push(ChatMessage::new(Role::User, user));

    messages
}

pub fn build_follow_up_messages(request: &FollowUpPrompt<'_>) -> Vec<ChatMessage> {
    let history = if request.previous_prompts.is_empty() {
        "You are modifying the HTML file based on the user's request.".to_string()
    } else {
        format!(
            "Also here are the previous prompts:\n\n{}",
            bullet_list(request.previous_prompts)
        )
    };

    let selected = request
        .selected_element_html
        .map(|html| {
            format!(
                "\n\nYou have to update ONLY the following element, NOTHING ELSE: \n\n```html\n{}\n```",
                html
            )
        })
        .unwrap_or_default();
    let images = if request.files.is_empty() {
        String::new()
    } else {
        format!("Current images: {}.", bullet_list(request.files))
    };
    let context = format!(
        "{}. Current pages: {}. {}",
        selected,
        page_listing(request.pages),
        images
    );

    vec![
        ChatMessage::new(Role::System, FOLLOW_UP_SYSTEM_PROMPT),
        ChatMessage::new(Role::User, history),
        ChatMessage::new(Role::Assistant, context),
        ChatMessage::new(Role::User, request.prompt),
    ]
}

fn page_listing(pages: &PageCollection) -> String {
    pages
        .iter()
        .map(|p| format!("- {} \n{}", p.path, p.html))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::Page;
    use crate::protocol::{
        DIVIDER, NEW_PAGE_END, NEW_PAGE_START, REPLACE_END, SEARCH_START, TITLE_PAGE_END,
        TITLE_PAGE_START, UPDATE_PAGE_END, UPDATE_PAGE_START,
    };
    use crate::scanner::scan;

    #[test]
    fn prompts_teach_the_parsed_protocol() {
        let title_header = format!("{TITLE_PAGE_START}index.html{TITLE_PAGE_END}");
        assert!(INITIAL_SYSTEM_PROMPT.contains(&title_header));

        for literal in [UPDATE_PAGE_START, SEARCH_START, DIVIDER, REPLACE_END, NEW_PAGE_START] {
            assert!(FOLLOW_UP_SYSTEM_PROMPT.contains(literal), "{literal}");
        }
        assert!(FOLLOW_UP_SYSTEM_PROMPT.contains(&format!("{UPDATE_PAGE_START}index.html{UPDATE_PAGE_END}")));
        assert!(FOLLOW_UP_SYSTEM_PROMPT.contains(&format!("{NEW_PAGE_START}index.html{NEW_PAGE_END}")));

        let example = scan(INITIAL_SYSTEM_PROMPT);
        assert_eq!(example.len(), 1);
        assert_eq!(example[0].path, "index.html");
    }

    #[test]
    fn single_page_generation_has_no_page_context() {
        let pages = PageCollection::from_pages(vec![Page::new("index.html", "<p>hi</p>")]);
        let messages = build_generation_messages(&GenerationPrompt {
            prompt: "A bakery site",
            redesign_markdown: None,
            pages: &pages,
            previous_prompts: &[],
        });
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert_eq!(messages[1].content, "A bakery site");
    }

    #[test]
    fn multi_page_generation_lists_pages_and_history() {
        let pages = PageCollection::from_pages(vec![
            Page::new("index.html", "<p>home</p>"),
            Page::new("menu.html", "<p>menu</p>"),
        ]);
        let previous = vec!["A bakery site".to_string()];
        let messages = build_generation_messages(&GenerationPrompt {
            prompt: "ignored",
            redesign_markdown: Some("# Bakery"),
            pages: &pages,
            previous_prompts: &previous,
        });
        assert_eq!(messages.len(), 3);
        assert!(messages[1]
            .content
            .starts_with("Here are the current pages:\n\n- index.html \n<p>home</p>\n- menu.html \n<p>menu</p>"));
        assert!(messages[1].content.ends_with("previous prompts:\n\n- A bakery site"));
        assert!(messages[2].content.contains("# Bakery"));
    }

    #[test]
    fn follow_up_includes_selection_pages_and_images() {
        let pages = PageCollection::from_pages(vec![Page::new("index.html", "<h1>x</h1>")]);
        let files = vec!["https://cdn.example/cake.png".to_string()];
        let messages = build_follow_up_messages(&FollowUpPrompt {
            prompt: "Make it pink",
            pages: &pages,
            previous_prompts: &[],
            selected_element_html: Some("<h1>x</h1>"),
            files: &files,
        });

        assert_eq!(messages[1].content, "You are modifying the HTML file based on the user's request.");
        let context = &messages[2].content;
        assert!(context.contains("ONLY the following element"));
        assert!(context.contains(". Current pages: - index.html \n<h1>x</h1>. "));
        assert!(context.ends_with("Current images: - https://cdn.example/cake.png."));
        assert_eq!(messages[3].content, "Make it pink");
    }

    #[test]
    fn request_uses_current_model_id() {
        let request = ChatCompletionRequest::new("deepseek-ai/DeepSeek-V3-0324", Vec::new())
            .with_max_tokens(4096);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "deepseek/deepseek-chat-v3-0324");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 4096);
    }
}
