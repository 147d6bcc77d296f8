//! Perception – turn a `uiautomator dump` of the accessibility tree into a
//! flat list of elements the external agent can act on.
//!
//! The tree is parsed in full first ([`parse_hierarchy`]) and then flattened
//! ([`flatten`]) so that unlabelled clickable containers can borrow the label
//! of the text inside them.

use crate::config::PerceptionConfig;
use crate::context::AppContext;
use crate::traits::{CapError, DeviceBridge};
use crate::types::ErrorCode;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    #[error("No Android device connected")]
    NotConnected,

    #[error("device bridge: {0}")]
    Bridge(#[from] CapError),

    #[error("uiautomator dump failed: {0}")]
    DumpFailed(String),

    #[error("malformed hierarchy XML: {0}")]
    Xml(String),

    #[error("hierarchy dump contains no nodes")]
    EmptyHierarchy,
}

impl PerceptionError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            PerceptionError::NotConnected => ErrorCode::DeviceNotConnected,
            PerceptionError::Bridge(CapError::DependencyMissing(_)) => ErrorCode::DependencyMissing,
            PerceptionError::Bridge(CapError::Unsupported(_)) => ErrorCode::Unsupported,
            PerceptionError::Bridge(CapError::DeviceUnavailable(_)) => {
                ErrorCode::DeviceNotConnected
            }
            PerceptionError::Bridge(CapError::Io(_)) => ErrorCode::IoError,
            PerceptionError::Bridge(CapError::Other(_)) => ErrorCode::InternalError,
            PerceptionError::DumpFailed(_) => ErrorCode::DumpFailed,
            PerceptionError::Xml(_) | PerceptionError::EmptyHierarchy => ErrorCode::ParseError,
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Screen rectangle in device pixels, as uiautomator reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Parse `[l,t][r,b]`.
    pub fn parse(s: &str) -> Option<Self> {
        let nums = s
            .split(['[', ']', ','])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse::<i32>)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        match nums.as_slice() {
            [left, top, right, bottom] => Some(Self {
                left: *left,
                top: *top,
                right: *right,
                bottom: *bottom,
            }),
            _ => None,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn has_area(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    pub fn center(&self) -> [i32; 2] {
        [(self.left + self.right) / 2, (self.top + self.bottom) / 2]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

// ---------------------------------------------------------------------------
// Raw tree
// ---------------------------------------------------------------------------

/// One `<node>` of the dump, with its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiNode {
    pub text: String,
    pub resource_id: String,
    pub class: String,
    pub package: String,
    pub content_desc: String,
    pub hint: String,
    pub checkable: bool,
    pub checked: bool,
    pub clickable: bool,
    pub long_clickable: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub focused: bool,
    pub scrollable: bool,
    pub password: bool,
    pub selected: bool,
    pub bounds: Bounds,
    pub children: Vec<UiNode>,
}

impl Default for UiNode {
    fn default() -> Self {
        Self {
            text: String::new(),
            resource_id: String::new(),
            class: String::new(),
            package: String::new(),
            content_desc: String::new(),
            hint: String::new(),
            checkable: false,
            checked: false,
            clickable: false,
            long_clickable: false,
            // Older dumps omit `enabled`; absent means enabled.
            enabled: true,
            focusable: false,
            focused: false,
            scrollable: false,
            password: false,
            selected: false,
            bounds: Bounds::default(),
            children: Vec::new(),
        }
    }
}

impl UiNode {
    fn from_start(e: &BytesStart<'_>) -> Result<Self, PerceptionError> {
        let mut node = UiNode::default();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| PerceptionError::Xml(err.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|err| PerceptionError::Xml(err.to_string()))?
                .into_owned();
            let flag = value == "true";
            match attr.key.as_ref() {
                b"text" => node.text = value,
                b"resource-id" => node.resource_id = value,
                b"class" => node.class = value,
                b"package" => node.package = value,
                b"content-desc" => node.content_desc = value,
                b"hint" => node.hint = value,
                b"checkable" => node.checkable = flag,
                b"checked" => node.checked = flag,
                b"clickable" => node.clickable = flag,
                b"long-clickable" => node.long_clickable = flag,
                b"enabled" => node.enabled = flag,
                b"focusable" => node.focusable = flag,
                b"focused" => node.focused = flag,
                b"scrollable" => node.scrollable = flag,
                b"password" => node.password = flag,
                b"selected" => node.selected = flag,
                b"bounds" => node.bounds = Bounds::parse(&value).unwrap_or_default(),
                _ => {}
            }
        }
        Ok(node)
    }

    /// First non-empty of text, content-desc, hint. Password text is masked.
    pub fn label(&self) -> Option<&str> {
        let text = self.text.trim();
        if !text.is_empty() {
            return Some(if self.password { "<password>" } else { text });
        }
        [self.content_desc.trim(), self.hint.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
    }

    /// Depth-first search for the first labelled descendant.
    fn descendant_label(&self) -> Option<String> {
        self.children.iter().find_map(|c| {
            c.label()
                .map(str::to_string)
                .or_else(|| c.descendant_label())
        })
    }

    pub fn short_class(&self) -> &str {
        self.class.rsplit('.').next().unwrap_or(&self.class)
    }

    pub fn is_editable(&self) -> bool {
        self.class.ends_with("EditText") || (self.focusable && self.class.contains("Edit"))
    }

    pub fn is_interactive(&self) -> bool {
        self.clickable || self.long_clickable || self.scrollable || self.is_editable()
    }
}

fn attach(stack: &mut [UiNode], roots: &mut Vec<UiNode>, node: UiNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Parse uiautomator XML into its root nodes.
pub fn parse_hierarchy(xml: &str) -> Result<Vec<UiNode>, PerceptionError> {
    // `adb shell cat` may prepend warnings; the document starts at the first tag.
    let start = xml.find('<').ok_or(PerceptionError::EmptyHierarchy)?;
    let mut reader = Reader::from_str(&xml[start..]);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<UiNode> = Vec::new();
    let mut roots = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"node" => {
                stack.push(UiNode::from_start(&e)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"node" => {
                let node = UiNode::from_start(&e)?;
                attach(&mut stack, &mut roots, node);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"node" => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut roots, node);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(PerceptionError::Xml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if !stack.is_empty() {
        return Err(PerceptionError::Xml(format!(
            "{} unclosed <node> element(s)",
            stack.len()
        )));
    }
    if roots.is_empty() {
        return Err(PerceptionError::EmptyHierarchy);
    }
    Ok(roots)
}

// ---------------------------------------------------------------------------
// Flattened view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Tap,
    Type,
    Scroll,
    Read,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SuggestedAction::Tap => "tap",
            SuggestedAction::Type => "type",
            SuggestedAction::Scroll => "scroll",
            SuggestedAction::Read => "read",
        })
    }
}

/// One candidate target, as handed to the external agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenElement {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub package: String,
    pub bounds: Bounds,
    /// Tap point, directly usable as `coordinates` in a tap action.
    pub center: [i32; 2],
    pub clickable: bool,
    pub scrollable: bool,
    pub editable: bool,
    pub focused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    pub password: bool,
    pub action: SuggestedAction,
}

impl ScreenElement {
    fn from_node(index: usize, node: &UiNode, label: Option<String>) -> Self {
        let editable = node.is_editable();
        let action = if editable {
            SuggestedAction::Type
        } else if node.clickable || node.long_clickable {
            SuggestedAction::Tap
        } else if node.scrollable {
            SuggestedAction::Scroll
        } else {
            SuggestedAction::Read
        };
        Self {
            index,
            label,
            class: node.short_class().to_string(),
            resource_id: Some(node.resource_id.clone()).filter(|s| !s.is_empty()),
            package: node.package.clone(),
            bounds: node.bounds,
            center: node.bounds.center(),
            clickable: node.clickable || node.long_clickable,
            scrollable: node.scrollable,
            editable,
            focused: node.focused,
            checked: node.checkable.then_some(node.checked),
            password: node.password,
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenOptions {
    pub include_text: bool,
    pub include_disabled: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            include_text: true,
            include_disabled: false,
        }
    }
}

impl From<&PerceptionConfig> for FlattenOptions {
    fn from(cfg: &PerceptionConfig) -> Self {
        Self {
            include_text: cfg.include_text,
            include_disabled: cfg.include_disabled,
        }
    }
}

/// Flatten the tree depth-first, in document order.
pub fn flatten(roots: &[UiNode], opts: &FlattenOptions) -> Vec<ScreenElement> {
    let mut out = Vec::new();
    for root in roots {
        visit(root, None, opts, &mut out);
    }
    out
}

fn visit(
    node: &UiNode,
    ancestor_label: Option<&str>,
    opts: &FlattenOptions,
    out: &mut Vec<ScreenElement>,
) {
    let mut label_for_children = ancestor_label.map(str::to_string);

    let visible = node.bounds.has_area() && (node.enabled || opts.include_disabled);
    if visible {
        if node.is_interactive() {
            let label = node
                .label()
                .map(str::to_string)
                .or_else(|| node.descendant_label());
            label_for_children = label.clone();
            out.push(ScreenElement::from_node(out.len(), node, label));
        } else if opts.include_text {
            if let Some(label) = node.label() {
                // Already represented by the interactive ancestor.
                if ancestor_label != Some(label) {
                    out.push(ScreenElement::from_node(
                        out.len(),
                        node,
                        Some(label.to_string()),
                    ));
                }
            }
        }
    }

    for child in &node.children {
        visit(child, label_for_children.as_deref(), opts, out);
    }
}

// ---------------------------------------------------------------------------
// Screen capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenState {
    pub captured_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenSize>,
    pub element_count: usize,
    pub elements: Vec<ScreenElement>,
}

/// Parse and flatten an already-fetched dump.
pub fn screen_from_xml(xml: &str, opts: &FlattenOptions) -> Result<ScreenState, PerceptionError> {
    let roots = parse_hierarchy(xml)?;
    let screen = roots
        .first()
        .map(|r| r.bounds)
        .filter(Bounds::has_area)
        .map(|b| ScreenSize {
            width: b.width(),
            height: b.height(),
        });
    let elements = flatten(&roots, opts);
    Ok(ScreenState {
        captured_at: chrono::Utc::now(),
        screen,
        element_count: elements.len(),
        elements,
    })
}

/// Dump the device's accessibility tree and flatten it.
pub fn capture_screen(ctx: &AppContext) -> Result<ScreenState, PerceptionError> {
    let bridge = ctx.bridge();
    let cfg = &ctx.config().perception;

    if !bridge.is_connected() {
        return Err(PerceptionError::NotConnected);
    }

    dump_hierarchy(bridge, cfg)?;
    let xml = read_dump(bridge, &cfg.dump_path)?;
    let state = screen_from_xml(&xml, &FlattenOptions::from(cfg))?;
    tracing::info!(elements = state.element_count, "screen captured");
    Ok(state)
}

fn dump_hierarchy(bridge: &dyn DeviceBridge, cfg: &PerceptionConfig) -> Result<(), PerceptionError> {
    let mut args = vec!["shell", "uiautomator", "dump"];
    if cfg.compressed {
        args.push("--compressed");
    }
    args.push(cfg.dump_path.as_str());

    let attempts = cfg.dump_attempts.max(1);
    let mut last_message = String::new();
    for attempt in 1..=attempts {
        let out = bridge.run(&args)?;
        // Old adb versions exit 0 even when the remote command fails.
        let reported_error = out.stdout.contains("ERROR") || out.stderr.contains("ERROR");
        if out.success() && !reported_error {
            tracing::debug!(attempt, "uiautomator dump ok");
            return Ok(());
        }
        last_message = out.failure_message();
        tracing::warn!(attempt, attempts, message = %last_message, "uiautomator dump failed");
        if attempt < attempts {
            std::thread::sleep(RETRY_DELAY);
        }
    }
    Err(PerceptionError::DumpFailed(last_message))
}

fn read_dump(bridge: &dyn DeviceBridge, path: &str) -> Result<String, PerceptionError> {
    let out = bridge.run(&["shell", "cat", path])?;
    if !out.success() {
        return Err(PerceptionError::DumpFailed(format!(
            "cannot read {}: {}",
            path,
            out.failure_message()
        )));
    }
    Ok(out.stdout)
}

/// Build a text listing of the screen for human output.
pub fn describe(state: &ScreenState) -> String {
    let mut lines = Vec::new();
    match state.screen {
        Some(size) => lines.push(format!(
            "Screen {}x{}, {} elements",
            size.width, size.height, state.element_count
        )),
        None => lines.push(format!("{} elements", state.element_count)),
    }
    if state.elements.is_empty() {
        lines.push("  No UI elements detected.".to_string());
    }
    for e in &state.elements {
        let label = match &e.label {
            Some(l) => format!(" \"{}\"", l),
            None => String::new(),
        };
        lines.push(format!(
            "  [{}] {}{} @ ({}, {}) {}",
            e.index, e.class, label, e.center[0], e.center[1], e.action
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_log::ActionLog;
    use crate::config::AppConfig;
    use crate::testing::ScriptedBridge;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="com.android.settings" content-desc="" clickable="false" enabled="true" focusable="false" scrollable="false" bounds="[0,0][1080,2340]">
    <node index="0" text="Settings" resource-id="com.android.settings:id/title" class="android.widget.TextView" package="com.android.settings" content-desc="" clickable="false" enabled="true" bounds="[42,180][400,260]" />
    <node index="1" text="" resource-id="com.android.settings:id/search" class="android.widget.EditText" package="com.android.settings" content-desc="" hint="Search settings" clickable="true" enabled="true" focusable="true" focused="true" bounds="[42,300][1038,420]" />
    <node index="2" text="" resource-id="" class="androidx.recyclerview.widget.RecyclerView" package="com.android.settings" content-desc="" clickable="false" enabled="true" scrollable="true" bounds="[0,450][1080,2340]">
      <node index="0" text="" resource-id="" class="android.widget.LinearLayout" package="com.android.settings" content-desc="" clickable="true" enabled="true" bounds="[0,450][1080,620]">
        <node index="0" text="Network &amp; internet" resource-id="android:id/title" class="android.widget.TextView" package="com.android.settings" content-desc="" clickable="false" enabled="true" bounds="[180,480][700,540]" />
        <node index="1" text="Wi-Fi, hotspot" resource-id="android:id/summary" class="android.widget.TextView" package="com.android.settings" content-desc="" clickable="false" enabled="true" bounds="[180,545][700,600]" />
      </node>
      <node index="1" text="" resource-id="" class="android.widget.Switch" package="com.android.settings" content-desc="Airplane mode" checkable="true" checked="false" clickable="true" enabled="false" bounds="[900,650][1038,720]" />
      <node index="2" text="" resource-id="" class="android.view.View" package="com.android.settings" content-desc="" clickable="false" enabled="true" bounds="[0,0][0,0]" />
    </node>
  </node>
</hierarchy>"#;

    fn labels(elements: &[ScreenElement]) -> Vec<Option<&str>> {
        elements.iter().map(|e| e.label.as_deref()).collect()
    }

    fn ctx_with(bridge: ScriptedBridge, tweak: impl FnOnce(&mut AppConfig)) -> AppContext {
        let mut cfg = AppConfig::default();
        tweak(&mut cfg);
        AppContext::new(Box::new(bridge), ActionLog::disabled(), cfg)
    }

    #[test]
    fn bounds_parse_and_center() {
        let b = Bounds::parse("[42,300][1038,420]").unwrap();
        assert_eq!(b.center(), [540, 360]);
        assert!(b.has_area());
        assert!(Bounds::parse("[0,0][10]").is_none());
        assert!(Bounds::parse("garbage").is_none());
        assert!(!Bounds::parse("[5,5][5,9]").unwrap().has_area());
    }

    #[test]
    fn parses_nested_tree() {
        let roots = parse_hierarchy(DUMP).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children.len(), 3);
        let list = &roots[0].children[2];
        assert!(list.scrollable);
        assert_eq!(list.children[0].children[0].text, "Network & internet");
    }

    #[test]
    fn flattens_interactive_and_text() {
        let roots = parse_hierarchy(DUMP).unwrap();
        let elements = flatten(&roots, &FlattenOptions::default());

        assert_eq!(
            labels(&elements),
            vec![
                Some("Settings"),
                Some("Search settings"),
                Some("Network & internet"),
                Some("Network & internet"),
                Some("Wi-Fi, hotspot"),
            ]
        );
        // Indices are sequential.
        assert!(elements.iter().enumerate().all(|(i, e)| e.index == i));

        let search = &elements[1];
        assert_eq!(search.action, SuggestedAction::Type);
        assert!(search.editable && search.focused);
        assert_eq!(search.resource_id.as_deref(), Some("com.android.settings:id/search"));
        assert_eq!(search.center, [540, 360]);

        // RecyclerView: scrollable, inherits the first descendant label.
        assert_eq!(elements[2].class, "RecyclerView");
        assert_eq!(elements[2].action, SuggestedAction::Scroll);

        // Clickable row inherits its title; its own title text is folded in.
        let row = &elements[3];
        assert_eq!(row.class, "LinearLayout");
        assert_eq!(row.action, SuggestedAction::Tap);
        assert_eq!(elements[4].action, SuggestedAction::Read);
    }

    #[test]
    fn disabled_nodes_are_opt_in() {
        let roots = parse_hierarchy(DUMP).unwrap();
        let opts = FlattenOptions {
            include_disabled: true,
            ..Default::default()
        };
        let elements = flatten(&roots, &opts);
        let switch = elements
            .iter()
            .find(|e| e.label.as_deref() == Some("Airplane mode"))
            .expect("switch kept when disabled nodes are included");
        assert_eq!(switch.checked, Some(false));
        assert_eq!(switch.action, SuggestedAction::Tap);
    }

    #[test]
    fn text_only_nodes_can_be_excluded() {
        let roots = parse_hierarchy(DUMP).unwrap();
        let opts = FlattenOptions {
            include_text: false,
            ..Default::default()
        };
        let elements = flatten(&roots, &opts);
        assert!(elements.iter().all(|e| e.action != SuggestedAction::Read));
        assert_eq!(elements.len(), 3);
    }

    #[test]
    fn password_text_is_masked() {
        let xml = r#"<hierarchy><node class="android.widget.EditText" text="hunter2" password="true" focusable="true" bounds="[0,0][100,50]" /></hierarchy>"#;
        let state = screen_from_xml(xml, &FlattenOptions::default()).unwrap();
        assert_eq!(state.elements[0].label.as_deref(), Some("<password>"));
        assert!(state.elements[0].password);
    }

    #[test]
    fn leading_noise_is_skipped() {
        let xml = format!("WARNING: linker: something\n{}", DUMP);
        let state = screen_from_xml(&xml, &FlattenOptions::default()).unwrap();
        assert_eq!(state.screen, Some(ScreenSize { width: 1080, height: 2340 }));
        assert_eq!(state.element_count, state.elements.len());
    }

    #[test]
    fn malformed_and_empty_dumps() {
        assert!(matches!(
            parse_hierarchy("<hierarchy><node bounds=\"[0,0][1,1]\"></hierarchy>"),
            Err(PerceptionError::Xml(_))
        ));
        assert!(matches!(
            parse_hierarchy("<hierarchy rotation=\"0\"></hierarchy>"),
            Err(PerceptionError::EmptyHierarchy)
        ));
        assert!(matches!(
            parse_hierarchy("cat: /sdcard/window_dump.xml: No such file or directory"),
            Err(PerceptionError::EmptyHierarchy)
        ));
    }

    #[test]
    fn describe_lists_elements() {
        let state = screen_from_xml(DUMP, &FlattenOptions::default()).unwrap();
        let text = describe(&state);
        assert!(text.starts_with("Screen 1080x2340, 5 elements"));
        assert!(text.contains("[1] EditText \"Search settings\" @ (540, 360) type"));
    }

    #[test]
    fn capture_requires_device() {
        let ctx = ctx_with(ScriptedBridge::new().respond("devices", "List of devices attached\n"), |_| {});
        let err = capture_screen(&ctx).unwrap_err();
        assert!(matches!(err, PerceptionError::NotConnected));
        assert_eq!(err.error_code(), ErrorCode::DeviceNotConnected);
    }

    #[test]
    fn capture_dumps_then_reads() {
        let bridge = ScriptedBridge::connected()
            .respond("shell uiautomator dump", "UI hierchary dumped to: /sdcard/window_dump.xml\n")
            .respond("shell cat", DUMP);
        let ctx = ctx_with(bridge, |_| {});
        let state = capture_screen(&ctx).unwrap();
        assert_eq!(state.element_count, 5);
    }

    #[test]
    fn dump_passes_compressed_flag_and_path() {
        let bridge = ScriptedBridge::connected();
        let mut cfg = AppConfig::default().perception;
        cfg.compressed = true;
        cfg.dump_path = "/data/local/tmp/ui.xml".into();
        dump_hierarchy(&bridge, &cfg).unwrap();
        assert_eq!(
            bridge.device_calls(),
            vec!["shell uiautomator dump --compressed /data/local/tmp/ui.xml"]
        );
    }

    #[test]
    fn dump_retries_transient_error() {
        let bridge = ScriptedBridge::connected()
            .respond("shell uiautomator dump", "ERROR: null root node returned by UiTestAutomationBridge.\n")
            .respond("shell uiautomator dump", "UI hierchary dumped to: /sdcard/window_dump.xml\n");
        let cfg = AppConfig::default().perception;
        dump_hierarchy(&bridge, &cfg).unwrap();
        assert_eq!(bridge.device_calls().len(), 2);
    }

    #[test]
    fn dump_gives_up_after_attempts() {
        let bridge = ScriptedBridge::connected().fail("shell uiautomator dump", 1, "Killed");
        let mut cfg = AppConfig::default().perception;
        cfg.dump_attempts = 1;
        let err = dump_hierarchy(&bridge, &cfg).unwrap_err();
        assert!(matches!(err, PerceptionError::DumpFailed(ref m) if m == "Killed"));
        assert_eq!(err.error_code(), ErrorCode::DumpFailed);
    }

    #[test]
    fn unreadable_dump_is_dump_failed() {
        let bridge = ScriptedBridge::connected().fail("shell cat", 1, "No such file or directory");
        let err = read_dump(&bridge, "/sdcard/window_dump.xml").unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));
    }

    #[test]
    fn bridge_errors_propagate() {
        let bridge = ScriptedBridge::connected().error("shell uiautomator", "pipe closed");
        let cfg = AppConfig::default().perception;
        let err = dump_hierarchy(&bridge, &cfg).unwrap_err();
        assert!(matches!(err, PerceptionError::Bridge(CapError::Other(_))));
    }
}
