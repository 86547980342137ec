//! HTML rendering for blocks.
//!
//! Rendering is a pure function of the block, the edit flag and the
//! caller-supplied [`BlockPosition`]. It never fails: media that cannot be
//! shown degrades to a placeholder and unrecognised variants render an
//! "unknown block" notice.

use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::blocks::media::{
    embed_url, is_acceptable_image_src, is_animated_image, is_supported_video_url,
};
use crate::blocks::{
    Block, BlockContent, BlockSettings, BlockWidth, ButtonContent, ButtonSize, ButtonVariant,
    ColumnsContent, HeroContent, ImageContent, TextContent, TextFormat, VideoContent,
    VideoSource,
};

const DEFAULT_OVERLAY_OPACITY: f64 = 0.5;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Prefix for the optimised image pipeline, e.g. `/_image?url=`. Animated
    /// and inline images bypass it.
    pub image_proxy: Option<String>,
}

/// Whether the move controls of a block are enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockPosition {
    pub can_move_up: bool,
    pub can_move_down: bool,
}

impl BlockPosition {
    pub fn in_list(index: usize, len: usize) -> Self {
        Self { can_move_up: index > 0, can_move_down: index + 1 < len }
    }
}

pub fn render_blocks(blocks: &[Block], is_editing: bool, options: &RenderOptions) -> String {
    let mut output = String::new();
    for (index, block) in blocks.iter().enumerate() {
        let position = BlockPosition::in_list(index, blocks.len());
        output.push_str(&render_block(block, is_editing, position, options));
    }
    output
}

pub fn render_block(
    block: &Block,
    is_editing: bool,
    position: BlockPosition,
    options: &RenderOptions,
) -> String {
    let settings = block.settings.clone().unwrap_or_default();
    let mut output = String::new();

    let _ = write!(
        output,
        "<div class=\"block-wrapper {}{}\" data-block-id=\"{}\" data-block-type=\"{}\"",
        width_class(settings.width.unwrap_or_default()),
        if is_editing { " is-editing" } else { "" },
        encode_double_quoted_attribute(block.id.as_str()),
        encode_double_quoted_attribute(block.content.type_name()),
    );
    let style = wrapper_style(&settings);
    if !style.is_empty() {
        let _ = write!(output, " style=\"{}\"", encode_double_quoted_attribute(&style));
    }
    output.push('>');

    if is_editing {
        output.push_str(&edit_controls(position));
    }
    output.push_str(&render_content(&block.content, options));
    output.push_str("</div>");
    output
}

fn width_class(width: BlockWidth) -> &'static str {
    match width {
        BlockWidth::Full => "w-full",
        BlockWidth::Wide => "max-w-6xl mx-auto",
        BlockWidth::Narrow => "max-w-4xl mx-auto",
    }
}

fn wrapper_style(settings: &BlockSettings) -> String {
    let mut rules = Vec::new();
    if let Some(padding) = &settings.padding {
        rules.push(format!("padding: {}", padding.to_css()));
    }
    if let Some(margin) = &settings.margin {
        rules.push(format!("margin: {}", margin.to_css()));
    }
    if let Some(color) = &settings.background_color {
        rules.push(format!("background-color: {color}"));
    }
    if let Some(color) = &settings.text_color {
        rules.push(format!("color: {color}"));
    }
    if let Some(alignment) = settings.alignment {
        rules.push(format!("text-align: {}", alignment.as_css()));
    }
    rules.join("; ")
}

fn edit_controls(position: BlockPosition) -> String {
    let disabled = |enabled: bool| if enabled { "" } else { " disabled" };
    format!(
        "<div class=\"block-controls\">\
         <span class=\"block-drag-handle\" data-action=\"drag\" title=\"Drag to reorder\">⋮⋮</span>\
         <button type=\"button\" data-action=\"move-up\" title=\"Move up\"{}>↑</button>\
         <button type=\"button\" data-action=\"move-down\" title=\"Move down\"{}>↓</button>\
         <button type=\"button\" data-action=\"delete\" class=\"block-delete\">Delete</button>\
         </div>",
        disabled(position.can_move_up),
        disabled(position.can_move_down),
    )
}

fn render_content(content: &BlockContent, options: &RenderOptions) -> String {
    match content {
        BlockContent::Heading(heading) => {
            let level = heading.level.get();
            format!("<h{level} class=\"block-heading\">{}</h{level}>", encode_text(&heading.text))
        }
        BlockContent::Text(text) => render_text(text),
        BlockContent::Image(image) => render_image(image, options),
        BlockContent::Video(video) => render_video(video),
        BlockContent::Button(button) => {
            format!("<div class=\"block-button\">{}</div>", render_button(button))
        }
        BlockContent::Spacer(spacer) => {
            format!("<div class=\"block-spacer\" style=\"height: {}px\"></div>", spacer.height)
        }
        BlockContent::Columns(columns) => render_columns(columns, options),
        BlockContent::Hero(hero) => render_hero(hero),
        BlockContent::Html(markup) => format!("<div class=\"block-html\">{}</div>", markup.html),
        BlockContent::Unknown { kind, .. } => format!(
            "<div class=\"block-unknown\">Unknown block type: {}</div>",
            encode_text(kind)
        ),
    }
}

fn render_text(text: &TextContent) -> String {
    match text.format.unwrap_or(TextFormat::Plain) {
        TextFormat::Plain => {
            let escaped = encode_text(&text.text).replace('\n', "<br>");
            format!("<div class=\"block-text\">{escaped}</div>")
        }
        TextFormat::Markdown => {
            format!("<div class=\"block-text prose\">{}</div>", render_markdown(&text.text))
        }
        TextFormat::Rich => format!("<div class=\"block-text rich\">{}</div>", text.text),
    }
}

/// Markdown to HTML. Links open in a new tab, raw HTML in the source is shown
/// as text and malformed input renders best-effort.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let events = Parser::new_ext(source, options).map(|event| match event {
        Event::Start(Tag::Link { dest_url, title, .. }) => {
            let mut tag = format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\"",
                encode_double_quoted_attribute(&dest_url)
            );
            if !title.is_empty() {
                let _ = write!(tag, " title=\"{}\"", encode_double_quoted_attribute(&title));
            }
            tag.push('>');
            Event::InlineHtml(CowStr::from(tag))
        }
        Event::End(TagEnd::Link) => Event::InlineHtml(CowStr::Borrowed("</a>")),
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut output, events);
    output
}

fn media_placeholder(icon: &str, message: &str) -> String {
    format!(
        "<div class=\"media-placeholder\"><span class=\"media-placeholder-icon\">{icon}</span>\
         <p>{}</p></div>",
        encode_text(message)
    )
}

fn render_image(image: &ImageContent, options: &RenderOptions) -> String {
    let src = image.src.trim();
    if src.is_empty() || !is_acceptable_image_src(src) {
        return media_placeholder("🖼️", "Image unavailable");
    }

    let animated = is_animated_image(src);
    let resolved = match (&options.image_proxy, animated || src.starts_with("data:")) {
        (Some(proxy), false) => {
            let encoded: String = url::form_urlencoded::byte_serialize(src.as_bytes()).collect();
            format!("{proxy}{encoded}")
        }
        _ => src.to_string(),
    };

    let mut img = format!(
        "<img src=\"{}\" alt=\"{}\" loading=\"lazy\"",
        encode_double_quoted_attribute(&resolved),
        encode_double_quoted_attribute(&image.alt)
    );
    if let Some(width) = image.width {
        let _ = write!(img, " width=\"{width}\"");
    }
    if let Some(height) = image.height {
        let _ = write!(img, " height=\"{height}\"");
    }
    if let Some(fit) = image.object_fit {
        let _ = write!(img, " style=\"object-fit: {}\"", fit.as_css());
    }
    if animated {
        img.push_str(" data-animated=\"true\"");
    }
    img.push('>');

    if let Some(link) = image.link.as_deref().filter(|link| !link.trim().is_empty()) {
        img = format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{img}</a>",
            encode_double_quoted_attribute(link)
        );
    }

    let caption = image
        .caption
        .as_deref()
        .filter(|caption| !caption.trim().is_empty())
        .map(|caption| format!("<figcaption>{}</figcaption>", encode_text(caption)))
        .unwrap_or_default();

    format!("<figure class=\"block-image\">{img}{caption}</figure>")
}

fn render_video(video: &VideoContent) -> String {
    let src = video.src.trim();
    if src.is_empty() || !is_supported_video_url(src) {
        return media_placeholder("🎥", "Video unavailable");
    }

    match video.source {
        VideoSource::Youtube | VideoSource::Vimeo => match embed_url(video) {
            Some(embed) => format!(
                "<div class=\"block-video\"><iframe src=\"{}\" frameborder=\"0\" \
                 allow=\"autoplay; fullscreen; picture-in-picture\" allowfullscreen></iframe></div>",
                encode_double_quoted_attribute(&embed)
            ),
            None => media_placeholder("🎥", "Video unavailable"),
        },
        VideoSource::Url => {
            let mut tag =
                format!("<video src=\"{}\" playsinline", encode_double_quoted_attribute(src));
            if video.controls.unwrap_or(true) {
                tag.push_str(" controls");
            }
            if video.autoplay == Some(true) {
                tag.push_str(" autoplay");
            }
            if video.looped == Some(true) {
                tag.push_str(" loop");
            }
            if video.muted == Some(true) {
                tag.push_str(" muted");
            }
            format!("<div class=\"block-video\">{tag}></video></div>")
        }
    }
}

fn render_button(button: &ButtonContent) -> String {
    let variant = match button.variant.unwrap_or_default() {
        ButtonVariant::Primary => "primary",
        ButtonVariant::Secondary => "secondary",
        ButtonVariant::Outline => "outline",
        ButtonVariant::Ghost => "ghost",
    };
    let size = match button.size.unwrap_or_default() {
        ButtonSize::Sm => "sm",
        ButtonSize::Md => "md",
        ButtonSize::Lg => "lg",
    };
    let icon = button
        .icon
        .as_deref()
        .filter(|icon| !icon.is_empty())
        .map(|icon| format!("<span class=\"btn-icon\">{}</span> ", encode_text(icon)))
        .unwrap_or_default();

    format!(
        "<a class=\"btn btn-{variant} btn-{size}\" href=\"{}\" target=\"_blank\" \
         rel=\"noopener noreferrer\">{icon}{}</a>",
        encode_double_quoted_attribute(&button.link),
        encode_text(&button.text)
    )
}

fn render_columns(columns: &ColumnsContent, options: &RenderOptions) -> String {
    let template = match columns.layout {
        Some(layout) if layout.fractions().len() == columns.columns.len() => layout
            .fractions()
            .iter()
            .map(|fraction| format!("{fraction}fr"))
            .collect::<Vec<_>>()
            .join(" "),
        _ => vec!["1fr"; columns.columns.len().max(1)].join(" "),
    };

    let mut output = format!(
        "<div class=\"block-columns\" style=\"display: grid; grid-template-columns: {template}\">"
    );
    for column in &columns.columns {
        output.push_str("<div class=\"block-column\">");
        output.push_str(&render_blocks(column, false, options));
        output.push_str("</div>");
    }
    output.push_str("</div>");
    output
}

/// Percent-encodes the characters that could end a quoted CSS `url()`.
fn css_url(src: &str) -> String {
    let mut encoded = String::with_capacity(src.len());
    for ch in src.trim().chars() {
        match ch {
            '\'' => encoded.push_str("%27"),
            '"' => encoded.push_str("%22"),
            '(' => encoded.push_str("%28"),
            ')' => encoded.push_str("%29"),
            '\\' => encoded.push_str("%5C"),
            ch if ch.is_whitespace() => encoded.push_str("%20"),
            ch => encoded.push(ch),
        }
    }
    encoded
}

fn render_hero(hero: &HeroContent) -> String {
    let mut output = String::from("<section class=\"block-hero\"");
    if let Some(image) = hero.background_image.as_deref().filter(|src| is_acceptable_image_src(src))
    {
        let _ = write!(
            output,
            " style=\"{}\"",
            encode_double_quoted_attribute(&format!("background-image: url('{}')", css_url(image)))
        );
    }
    output.push('>');

    if let Some(video) = hero.background_video.as_deref().filter(|src| is_supported_video_url(src))
    {
        let _ = write!(
            output,
            "<video class=\"hero-background\" src=\"{}\" autoplay muted loop playsinline></video>",
            encode_double_quoted_attribute(video)
        );
    }
    if hero.overlay.unwrap_or(false) {
        let opacity = hero.overlay_opacity.unwrap_or(DEFAULT_OVERLAY_OPACITY).clamp(0.0, 1.0);
        let _ = write!(output, "<div class=\"hero-overlay\" style=\"opacity: {opacity}\"></div>");
    }

    let _ = write!(output, "<div class=\"hero-content\"><h1>{}</h1>", encode_text(&hero.title));
    if let Some(subtitle) = hero.subtitle.as_deref().filter(|subtitle| !subtitle.is_empty()) {
        let _ = write!(output, "<p class=\"hero-subtitle\">{}</p>", encode_text(subtitle));
    }
    if let Some(buttons) = hero.buttons.as_ref().filter(|buttons| !buttons.is_empty()) {
        output.push_str("<div class=\"hero-buttons\">");
        for button in buttons {
            output.push_str(&render_button(button));
        }
        output.push_str("</div>");
    }
    output.push_str("</div></section>");
    output
}
