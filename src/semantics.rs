//! Resource and DOM catalog consulted by lowering and linking.
//!
//! `Semantics::default()` is the built-in HTML catalog: the standard template
//! controllers, a handful of built-in attributes/converters/behaviors, the native DOM
//! property schema and the event schema. Callers register their own components on top
//! with the `with_*` builders or supply a whole catalog through compile options.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::ir::BindingMode;

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC TABLES
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// Attribute names whose DOM property is not the camel-cased attribute name.
    static ref ATTR_TO_PROP: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("class", "className");
        m.insert("for", "htmlFor");
        m.insert("tabindex", "tabIndex");
        m.insert("readonly", "readOnly");
        m.insert("maxlength", "maxLength");
        m.insert("minlength", "minLength");
        m.insert("colspan", "colSpan");
        m.insert("rowspan", "rowSpan");
        m.insert("contenteditable", "contentEditable");
        m.insert("accesskey", "accessKey");
        m.insert("crossorigin", "crossOrigin");
        m.insert("novalidate", "noValidate");
        m.insert("innerhtml", "innerHTML");
        m.insert("textcontent", "textContent");
        m.insert("innertext", "innerText");
        m.insert("selectedindex", "selectedIndex");
        m.insert("currenttime", "currentTime");
        m.insert("playbackrate", "playbackRate");
        m.insert("valueasnumber", "valueAsNumber");
        m.insert("valueasdate", "valueAsDate");
        m.insert("srcdoc", "srcdoc");
        m
    };

    /// Names that only exist as attributes and never as properties.
    static ref ATTRIBUTE_ONLY: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for name in ["role", "list", "form", "xmlns", "viewbox", "fill", "stroke", "d", "points"] {
            s.insert(name);
        }
        s
    };

    static ref GLOBAL_PROPS: Vec<&'static str> = vec![
        "id", "className", "title", "hidden", "lang", "dir", "tabIndex", "accessKey",
        "draggable", "contentEditable", "innerHTML", "textContent", "innerText", "slot",
        "spellcheck", "translate", "inert", "autofocus", "nonce", "scrollTop", "scrollLeft",
    ];

    static ref TAG_PROPS: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("input", vec![
            "value", "checked", "type", "name", "placeholder", "disabled", "readOnly",
            "required", "min", "max", "step", "pattern", "files", "valueAsNumber",
            "valueAsDate", "multiple", "accept", "autocomplete", "size", "maxLength",
            "minLength", "indeterminate",
        ]),
        ("textarea", vec![
            "value", "rows", "cols", "placeholder", "disabled", "readOnly", "required",
            "name", "maxLength", "minLength", "wrap",
        ]),
        ("select", vec!["value", "multiple", "disabled", "name", "selectedIndex", "size", "required"]),
        ("option", vec!["value", "selected", "disabled", "label", "text"]),
        ("button", vec!["disabled", "type", "name", "value"]),
        ("a", vec!["href", "target", "rel", "download", "hreflang"]),
        ("img", vec!["src", "alt", "width", "height", "srcset", "sizes", "loading", "crossOrigin"]),
        ("form", vec!["action", "method", "noValidate", "enctype", "target"]),
        ("label", vec!["htmlFor"]),
        ("video", vec![
            "src", "controls", "autoplay", "loop", "muted", "currentTime", "volume", "paused",
            "playbackRate", "poster", "width", "height",
        ]),
        ("audio", vec![
            "src", "controls", "autoplay", "loop", "muted", "currentTime", "volume", "paused",
            "playbackRate",
        ]),
        ("iframe", vec!["src", "srcdoc", "name", "allow", "width", "height"]),
        ("td", vec!["colSpan", "rowSpan"]),
        ("th", vec!["colSpan", "rowSpan"]),
        ("details", vec!["open"]),
        ("dialog", vec!["open"]),
        ("progress", vec!["value", "max"]),
        ("meter", vec!["value", "min", "max", "low", "high", "optimum"]),
        ("canvas", vec!["width", "height"]),
    ];

    static ref TWO_WAY_DEFAULTS: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("input", vec!["value", "checked", "files", "valueAsNumber", "valueAsDate"]),
        ("textarea", vec!["value"]),
        ("select", vec!["value"]),
        ("*", vec!["scrollTop", "scrollLeft"]),
    ];

    static ref DOM_EVENTS: Vec<&'static str> = vec![
        "click", "dblclick", "input", "change", "submit", "reset", "keydown", "keyup",
        "keypress", "focus", "blur", "focusin", "focusout", "mousedown", "mouseup",
        "mousemove", "mouseenter", "mouseleave", "mouseover", "mouseout", "contextmenu",
        "wheel", "scroll", "resize", "load", "error", "touchstart", "touchend", "touchmove",
        "touchcancel", "pointerdown", "pointerup", "pointermove", "pointerenter",
        "pointerleave", "pointercancel", "drag", "dragstart", "dragend", "dragenter",
        "dragleave", "dragover", "drop", "copy", "cut", "paste", "select", "toggle",
        "animationstart", "animationend", "transitionend", "play", "pause", "ended",
        "timeupdate", "invalid", "beforeinput", "compositionstart", "compositionend",
        "close", "cancel",
    ];

    static ref BUILTIN_BEHAVIORS: Vec<&'static str> = vec![
        "debounce", "throttle", "oneTime", "toView", "fromView", "twoWay", "signal", "attr",
        "self", "updateTrigger",
    ];
}

/// `first-name` → `firstName`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOURCES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bindable {
    /// Property name on the view-model.
    pub name: String,
    /// Attribute spelling in markup.
    pub attribute: String,
    pub mode: BindingMode,
}

impl Bindable {
    pub fn new(name: &str, mode: BindingMode) -> Self {
        let attribute = name
            .chars()
            .flat_map(|c| {
                if c.is_ascii_uppercase() {
                    vec!['-', c.to_ascii_lowercase()]
                } else {
                    vec![c]
                }
            })
            .collect();
        Self {
            name: name.to_string(),
            attribute,
            mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementRes {
    pub name: String,
    pub bindables: Vec<Bindable>,
    #[serde(default)]
    pub events: Vec<String>,
}

impl ElementRes {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn bindable(mut self, name: &str, mode: BindingMode) -> Self {
        self.bindables.push(Bindable::new(name, mode));
        self
    }

    pub fn event(mut self, name: &str) -> Self {
        self.events.push(name.to_string());
        self
    }

    /// Looks a bindable up by attribute spelling or property name.
    pub fn find_bindable(&self, name: &str) -> Option<&Bindable> {
        self.bindables
            .iter()
            .find(|b| b.attribute == name || b.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRes {
    pub name: String,
    pub default_property: String,
    pub bindables: Vec<Bindable>,
}

impl AttributeRes {
    pub fn new(name: &str, default_mode: BindingMode) -> Self {
        Self {
            name: name.to_string(),
            default_property: "value".to_string(),
            bindables: vec![Bindable::new("value", default_mode)],
        }
    }

    pub fn find_bindable(&self, name: &str) -> Option<&Bindable> {
        self.bindables
            .iter()
            .find(|b| b.attribute == name || b.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerKind {
    Repeat,
    If,
    Else,
    With,
    Switch,
    Case,
    DefaultCase,
    Promise,
    Pending,
    Then,
    Catch,
    Portal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRes {
    pub name: String,
    pub kind: ControllerKind,
    pub default_property: String,
    /// Option names accepted after `;` in an iterator header.
    #[serde(default)]
    pub tail_options: Vec<String>,
}

impl ControllerRes {
    fn new(name: &str, kind: ControllerKind, default_property: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default_property: default_property.to_string(),
            tail_options: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CATALOG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semantics {
    pub elements: BTreeMap<String, ElementRes>,
    pub attributes: BTreeMap<String, AttributeRes>,
    pub controllers: BTreeMap<String, ControllerRes>,
    pub converters: BTreeSet<String>,
    pub behaviors: BTreeSet<String>,
    pub events: BTreeSet<String>,
    /// Native properties per tag; `*` applies to every element.
    pub dom: BTreeMap<String, BTreeSet<String>>,
    /// `(tag, property)` pairs that default to two-way; `*` matches any tag.
    pub two_way: BTreeMap<String, BTreeSet<String>>,
}

impl Default for Semantics {
    fn default() -> Self {
        Self::html()
    }
}

impl Semantics {
    pub fn html() -> Self {
        let mut controllers = BTreeMap::new();
        let mut repeat = ControllerRes::new("repeat", ControllerKind::Repeat, "items");
        repeat.tail_options.push("key".to_string());
        for ctrl in [
            repeat,
            ControllerRes::new("if", ControllerKind::If, "value"),
            ControllerRes::new("else", ControllerKind::Else, "value"),
            ControllerRes::new("with", ControllerKind::With, "value"),
            ControllerRes::new("switch", ControllerKind::Switch, "value"),
            ControllerRes::new("case", ControllerKind::Case, "value"),
            ControllerRes::new("default-case", ControllerKind::DefaultCase, "value"),
            ControllerRes::new("promise", ControllerKind::Promise, "value"),
            ControllerRes::new("pending", ControllerKind::Pending, "value"),
            ControllerRes::new("then", ControllerKind::Then, "value"),
            ControllerRes::new("catch", ControllerKind::Catch, "value"),
            ControllerRes::new("portal", ControllerKind::Portal, "target"),
        ] {
            controllers.insert(ctrl.name.clone(), ctrl);
        }

        let mut elements = BTreeMap::new();
        elements.insert(
            "au-compose".to_string(),
            ElementRes::new("au-compose")
                .bindable("component", BindingMode::ToView)
                .bindable("template", BindingMode::ToView)
                .bindable("model", BindingMode::ToView)
                .bindable("composition", BindingMode::FromView)
                .bindable("tag", BindingMode::ToView),
        );
        elements.insert(
            "au-slot".to_string(),
            ElementRes::new("au-slot").bindable("expose", BindingMode::ToView),
        );

        let mut attributes = BTreeMap::new();
        attributes.insert("show".to_string(), AttributeRes::new("show", BindingMode::ToView));
        attributes.insert("focus".to_string(), AttributeRes::new("focus", BindingMode::TwoWay));

        let mut dom: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        dom.insert("*".to_string(), GLOBAL_PROPS.iter().map(|p| p.to_string()).collect());
        for (tag, props) in TAG_PROPS.iter() {
            dom.insert(tag.to_string(), props.iter().map(|p| p.to_string()).collect());
        }

        let mut two_way: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (tag, props) in TWO_WAY_DEFAULTS.iter() {
            two_way.insert(tag.to_string(), props.iter().map(|p| p.to_string()).collect());
        }

        Self {
            elements,
            attributes,
            controllers,
            converters: ["sanitize".to_string()].into_iter().collect(),
            behaviors: BUILTIN_BEHAVIORS.iter().map(|b| b.to_string()).collect(),
            events: DOM_EVENTS.iter().map(|e| e.to_string()).collect(),
            dom,
            two_way,
        }
    }

    pub fn with_element(mut self, element: ElementRes) -> Self {
        self.elements.insert(element.name.clone(), element);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeRes) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    pub fn with_converter(mut self, name: &str) -> Self {
        self.converters.insert(name.to_string());
        self
    }

    pub fn with_behavior(mut self, name: &str) -> Self {
        self.behaviors.insert(name.to_string());
        self
    }

    pub fn element(&self, tag: &str) -> Option<&ElementRes> {
        self.elements.get(tag)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeRes> {
        self.attributes.get(name)
    }

    pub fn controller(&self, name: &str) -> Option<&ControllerRes> {
        self.controllers.get(name)
    }

    /// DOM property name for an attribute spelling.
    pub fn attr_to_prop(&self, attr: &str) -> String {
        let lower = attr.to_ascii_lowercase();
        match ATTR_TO_PROP.get(lower.as_str()) {
            Some(prop) => prop.to_string(),
            None => to_camel_case(attr),
        }
    }

    pub fn is_native_prop(&self, tag: &str, prop: &str) -> bool {
        let has = |key: &str| self.dom.get(key).map(|p| p.contains(prop)).unwrap_or(false);
        has(tag) || has("*")
    }

    pub fn is_attribute_only(&self, attr: &str) -> bool {
        attr.starts_with("data-")
            || attr.starts_with("aria-")
            || ATTRIBUTE_ONLY.contains(attr.to_ascii_lowercase().as_str())
    }

    pub fn is_two_way_default(&self, tag: &str, prop: &str) -> bool {
        let has = |key: &str| {
            self.two_way
                .get(key)
                .map(|p| p.contains(prop))
                .unwrap_or(false)
        };
        has(tag) || has("*")
    }

    /// Known DOM event, or one declared by the hosting custom element.
    pub fn is_known_event(&self, tag: &str, event: &str) -> bool {
        self.events.contains(event)
            || self
                .element(tag)
                .map(|el| el.events.iter().any(|e| e == event))
                .unwrap_or(false)
    }
}
