// SPDX-License-Identifier: MPL-2.0

//! Markup inserted by the switcher into its container.
//!
//! The produced tree is a `.background-plugin` wrapper holding, depending on
//! the configuration, a `.thumbs` list of radio controls, a `.progressive-blur`
//! stack of decorative layers, and always one `.contenedor` content layer.

use bg_switcher_config::{BACKGROUND_COUNT, Config};
use std::fmt::Write as _;

pub const PLUGIN_CLASS: &str = "background-plugin";
pub const THUMBS_CLASS: &str = "thumbs";
pub const BLUR_CLASS: &str = "progressive-blur";
pub const CONTENT_CLASS: &str = "contenedor";
pub const SELECTED_CLASS: &str = "selected";

/// Number of layers in the progressive blur stack.
pub const BLUR_LAYERS: usize = 6;

/// Root class marking background `index` as active.
pub fn background_class(index: usize) -> String {
    format!("bg-{index}")
}

/// A minimal element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn set_class(&mut self, class: &str, present: bool) {
        if present {
            if !self.has_class(class) {
                self.classes.push(class.to_string());
            }
        } else {
            self.classes.retain(|c| c != class);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets or, with `None`, removes an attribute.
    pub fn set_attribute(&mut self, name: &str, value: Option<&str>) {
        let Some(value) = value else {
            self.attributes.retain(|(n, _)| n != name);
            return;
        };
        match self.attributes.iter().position(|(n, _)| n == name) {
            Some(pos) => self.attributes[pos].1 = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// Depth-first search for the first element carrying `class`.
    pub fn find_class(&self, class: &str) -> Option<&Element> {
        if self.has_class(class) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_class(class))
    }

    pub fn find_class_mut(&mut self, class: &str) -> Option<&mut Element> {
        if self.has_class(class) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_class_mut(class))
    }

    pub fn children_with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let _ = write!(out, "<{}", self.tag);
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape(&self.classes.join(" ")));
        }
        for (name, value) in &self.attributes {
            if value.is_empty() {
                let _ = write!(out, " {name}");
            } else {
                let _ = write!(out, " {name}=\"{}\"", escape(value));
            }
        }
        out.push('>');

        if is_void(&self.tag) {
            return;
        }

        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "input" | "img" | "br" | "hr" | "meta" | "link")
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// One `label > input[type=radio]` per background.
pub fn thumbs_markup() -> Element {
    (0..BACKGROUND_COUNT).fold(Element::new("div").with_class(THUMBS_CLASS), |thumbs, _| {
        thumbs.with_child(
            Element::new("label").with_child(
                Element::new("input")
                    .with_attribute("type", "radio")
                    .with_attribute("name", "image"),
            ),
        )
    })
}

pub fn progressive_blur_markup() -> Element {
    (0..BLUR_LAYERS).fold(Element::new("div").with_class(BLUR_CLASS), |blur, _| {
        blur.with_child(Element::new("div"))
    })
}

/// Builds the complete wrapper for `config`.
pub fn plugin_markup(config: &Config) -> Element {
    let mut plugin = Element::new("div").with_class(PLUGIN_CLASS);
    if config.enable_thumbs {
        plugin = plugin.with_child(thumbs_markup());
    }
    if config.enable_progressive_blur {
        plugin = plugin.with_child(progressive_blur_markup());
    }
    plugin.with_child(Element::new("div").with_class(CONTENT_CLASS))
}
