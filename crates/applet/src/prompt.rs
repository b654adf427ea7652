//! Prompt composition for each operation kind.
//!
//! Every prompt demands the delimiter wire contract parsed by
//! [`crate::response`]: free-form output cannot be reliably split into a
//! description and an artifact. Create-from-description prompts additionally
//! demand the NAME and ICON sections.

use serde::Serialize;

use crate::catalog;
use crate::response::Section;
use crate::{GenerationRequest, ModelId, OperationInputs, OperationKind, TokenCount};

/// Sampling temperature used for every operation.
pub const TEMPERATURE: f32 = 0.7;

/// Path the running artifact posts proxy requests to.
pub const GATEWAY_PATH: &str = "/api/app-proxy";

/// A fully composed generator request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub model: ModelId,
    pub max_output_tokens: TokenCount,
    pub temperature: f32,
}

/// Builds the prompt for `request`.
pub fn compose(request: &GenerationRequest) -> Prompt {
    let name = request.identity().as_str();
    let ratio = request.aspect_ratio().as_str();

    let (system, user) = match (request.kind(), request.inputs()) {
        (OperationKind::Create, OperationInputs::Describe { description, .. }) => (
            CREATE_SYSTEM,
            describe_prompt(description, ratio),
        ),
        (OperationKind::Create, _) => (CREATE_SYSTEM, catalog_prompt(name, ratio)),
        (kind, OperationInputs::Modify { current_artifact, command }) => (
            system_for(kind),
            modify_prompt(kind, name, current_artifact, command.as_deref(), ratio),
        ),
        // GenerationRequest::new rejects rewrites without an artifact.
        (kind, _) => (system_for(kind), modify_prompt(kind, name, "", None, ratio)),
    };

    Prompt {
        system: system.to_string(),
        user,
        model: request.model().clone(),
        max_output_tokens: request.max_output_tokens(),
        temperature: TEMPERATURE,
    }
}

// ---------------------------------------------------------------------------
// System messages
// ---------------------------------------------------------------------------

const CREATE_SYSTEM: &str = "You are an expert web developer who creates single-file HTML applications. Return a concise description followed by valid HTML code in the specified format. Use the exact delimiter format provided.";

const ENHANCE_SYSTEM: &str = "You are an expert web developer who enhances existing apps by adding new features and improving functionality. Return a concise description followed by valid HTML code in the specified format. Use the exact delimiter format provided.";

const FIX_SYSTEM: &str = "You are an expert web developer who analyzes and fixes HTML applications. You identify user experience issues, bugs, and problems, then fix them. Return a concise description followed by valid HTML code in the specified format. Use the exact delimiter format provided.";

const CUSTOMIZE_SYSTEM: &str = "You are an expert web developer who modifies HTML applications based on user commands. Return a concise description followed by valid HTML code in the specified format. Use the exact delimiter format provided.";

fn system_for(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Create => CREATE_SYSTEM,
        OperationKind::Enhance => ENHANCE_SYSTEM,
        OperationKind::Fix => FIX_SYSTEM,
        OperationKind::Customize => CUSTOMIZE_SYSTEM,
    }
}

// ---------------------------------------------------------------------------
// Shared fragments
// ---------------------------------------------------------------------------

const CORE_RULE: &str = "Core Rule: Build ONLY the essential, foundational features needed for this app to function. Nothing extra. This is the minimal core - simple but solid, easily expandable later.";

const SINGLE_FILE_RULES: &str = "\
- Keep it as a single-file HTML application (all CSS in <style> tags, all JavaScript in <script> tags)
- Ensure the code works in a sandboxed iframe
- Do NOT use markdown code blocks";

fn gateway_instructions() -> String {
    format!(
        "INTERNET ACCESS:
Apps can fetch data from public APIs only through the proxy endpoint. Direct network requests from the app are not allowed.

Usage:
  fetch('{GATEWAY_PATH}', {{
    method: 'POST',
    headers: {{ 'Content-Type': 'application/json' }},
    body: JSON.stringify({{
      url: 'https://api.example.com/endpoint',
      method: 'GET',  // GET, POST, PUT, DELETE
      headers: {{}},   // Optional custom headers (for API keys, etc.)
      body: {{}}       // Optional JSON body for POST/PUT
    }})
  }})
  .then(res => res.json())
  .then(result => {{
    if (result.error) {{ /* show a friendly message */ return }}
    const data = result.data      // parsed JSON, or text
    const status = result.status  // upstream HTTP status
  }})

Limits: internal networks are blocked, responses over 5MB or with binary content types are refused, each request times out after 10 seconds, and requests are rate limited per client. Handle every error gracefully."
    )
}

fn output_format(with_identity: bool) -> String {
    let mut out = String::from("OUTPUT FORMAT (REQUIRED):\nUse this exact format:\n");
    if with_identity {
        for (section, hint) in [
            (Section::Name, "[app name, 2-4 words, clear and descriptive]"),
            (Section::Icon, "[single emoji icon]"),
        ] {
            out.push_str(&format!(
                "{}\n{hint}\n{}\n\n",
                section.begin_marker(),
                section.end_marker()
            ));
        }
    }
    out.push_str(&format!(
        "{}\n[description text here]\n{}\n\n[HTML code here - start with <!DOCTYPE html> and end with </html>]",
        Section::Description.begin_marker(),
        Section::Description.end_marker()
    ));
    out
}

const DESCRIPTION_GUIDANCE: &str = "\
The description (6-10 sentences) must describe the ENTIRE app as it exists after this change, not just the changes. Cover:
- All features, existing and new
- The UI layout and visual hierarchy
- Key interactions, data flow, and state changes
- Technical details critical for functionality (algorithms, data structures, event handling)
- Design elements: colors, typography, spacing, animations
- The user experience flow
It must be complete enough for an LLM to rebuild the entire app from scratch using only this description.";

// ---------------------------------------------------------------------------
// Operation prompts
// ---------------------------------------------------------------------------

fn describe_prompt(description: &str, ratio: &str) -> String {
    format!(
        "Based on this user description, create a mobile app:

User Description: \"{description}\"

REQUIREMENTS:
1. Generate an appropriate app name (2-4 words, clear and descriptive)
2. Choose a relevant emoji icon (single emoji, appropriate for the app concept)
3. Create the app code

{format}

The app should be a single-file HTML application with all CSS in <style> and JavaScript in <script> tags. Aspect ratio: {ratio} (fills entire viewport). Dark theme, mobile-friendly. Include: window.parent.postMessage({{ type: 'app-ready', appName: '[generated app name]' }}, '*') when ready.

{gateway}

{CORE_RULE}",
        format = output_format(true),
        gateway = gateway_instructions(),
    )
}

fn catalog_prompt(name: &str, ratio: &str) -> String {
    format!(
        "Create a single-file HTML app for \"{name}\" - the MOST FOUNDATIONAL version that works.

{CORE_RULE}

Technical:
- Single HTML file: CSS in <style>, JavaScript in <script>, all inline
- Works in sandboxed iframe (no external resources)
- Aspect ratio: {ratio} (fills entire viewport)
- Dark theme, mobile-friendly
- Include: window.parent.postMessage({{ type: 'app-ready', appName: '{name}' }}, '*') when ready

{gateway}

App: {app}

First provide a detailed natural language description of the app (6-10 sentences) covering features, layout, interactions, key technical details, and design. Then provide the complete HTML code.

{format}

Do NOT use markdown code blocks.",
        gateway = gateway_instructions(),
        app = catalog::describe(name),
        format = output_format(false),
    )
}

fn modify_prompt(
    kind: OperationKind,
    name: &str,
    current: &str,
    command: Option<&str>,
    ratio: &str,
) -> String {
    let task = match kind {
        OperationKind::Enhance => format!(
            "Enhance this \"{name}\" app by adding more advanced features and functionality. Keep all existing functionality intact while adding new features on top.

Auto-optimize existing code first:
- Remove redundant code, consolidate duplicate functions, simplify complex logic
- Merge duplicate styles and remove unused ones
- The goal is code that is BETTER and ideally SMALLER even after adding features"
        ),
        OperationKind::Fix => format!(
            "The user is frustrated with this \"{name}\" app. Analyze the HTML below, identify what might be causing frustration, and fix it.

SPECIFIC CHECKS TO PERFORM:
1. Button functionality: every button must have a working handler that performs an action.
2. Visibility: all content must be visible within the viewport.
3. Scrolling: content that extends beyond the screen must scroll (overflow-y: auto).

Also fix broken features, JavaScript errors, overlapping or cut-off elements, unreadable colors, and unresponsive UI. Maintain the same app concept."
        ),
        OperationKind::Customize => format!(
            "The user wants to modify this \"{name}\" app. Follow their command exactly:

User's Command: \"{command}\"

Maintain existing functionality unless the command asks to remove it. If the command is unclear, make reasonable assumptions.",
            command = command.unwrap_or_default().trim()
        ),
        OperationKind::Create => format!("Rebuild this \"{name}\" app."),
    };

    format!(
        "{task}

Current HTML code:
```html
{current}
```

{DESCRIPTION_GUIDANCE}

Then provide the complete HTML code.

{format}

Requirements:
{SINGLE_FILE_RULES}
- Aspect ratio: {ratio} (fills entire viewport)
- Any network access must keep using {GATEWAY_PATH}",
        format = output_format(false),
    )
}
