// SPDX-License-Identifier: MPL-2.0

//! The surface the switcher draws on.
//!
//! The switcher never touches a document directly. Every visible effect is a
//! [`PresentationChange`] handed to a [`PresentationSink`], which lets the same
//! component drive a real page, a log, or the in-memory [`MemorySink`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use bg_switcher_config::Container;

use crate::markup::{Element, PLUGIN_CLASS, SELECTED_CLASS, THUMBS_CLASS};
use crate::stylesheet::{Rule, Stylesheet};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("container {0} does not exist")]
    UnknownContainer(Container),
    #[error("no .{0} element has been inserted")]
    MissingElement(&'static str),
    #[error("thumbnail {0} does not exist")]
    MissingThumb(usize),
}

/// CSS `display` values the thumbnail list toggles between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Flex,
    Hidden,
}

impl Display {
    pub fn css_value(self) -> &'static str {
        match self {
            Display::Flex => "flex",
            Display::Hidden => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationChange {
    /// Insert `markup` as the first child of `container`.
    InsertMarkup {
        container: Container,
        markup: Element,
    },
    /// Remove the wrapper previously inserted into `container`.
    RemoveMarkup { container: Container },
    AddRootClass(String),
    RemoveRootClass(String),
    /// Visual and logical state of the 1-based thumbnail at `position`.
    ThumbState {
        position: usize,
        selected: bool,
        checked: bool,
    },
    ThumbsDisplay(Display),
}

pub trait PresentationSink {
    fn has_container(&self, container: &Container) -> bool;

    /// Whether markup inserted into `container` is live and can receive input.
    fn is_attached(&self, container: &Container) -> bool;

    fn apply(&mut self, change: PresentationChange) -> Result<(), SinkError>;

    /// Classes currently set on the presentation root.
    fn root_classes(&self) -> Vec<String>;

    /// Resolved value of a custom property on the presentation root.
    fn computed_variable(&self, name: &str) -> Option<String>;
}

impl<S: PresentationSink> PresentationSink for Rc<RefCell<S>> {
    fn has_container(&self, container: &Container) -> bool {
        self.borrow().has_container(container)
    }

    fn is_attached(&self, container: &Container) -> bool {
        self.borrow().is_attached(container)
    }

    fn apply(&mut self, change: PresentationChange) -> Result<(), SinkError> {
        self.borrow_mut().apply(change)
    }

    fn root_classes(&self) -> Vec<String> {
        self.borrow().root_classes()
    }

    fn computed_variable(&self, name: &str) -> Option<String> {
        self.borrow().computed_variable(name)
    }
}

/// In-memory presentation surface.
#[derive(Debug, Clone)]
pub struct MemorySink {
    containers: BTreeMap<Container, Vec<Element>>,
    root_classes: BTreeSet<String>,
    rules: Vec<Rule>,
    attached: bool,
    applied: usize,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// A surface with a single `body` container whose markup attaches
    /// immediately.
    pub fn new() -> Self {
        Self {
            containers: BTreeMap::from([(Container::default(), Vec::new())]),
            root_classes: BTreeSet::new(),
            rules: Vec::new(),
            attached: true,
            applied: 0,
        }
    }

    pub fn with_container(mut self, container: impl Into<Container>) -> Self {
        self.containers.entry(container.into()).or_default();
        self
    }

    /// Inserted markup is not live until [`MemorySink::set_attached`].
    pub fn detached(mut self) -> Self {
        self.attached = false;
        self
    }

    pub fn with_stylesheet(mut self, sheet: &Stylesheet) -> Self {
        self.add_stylesheet(sheet);
        self
    }

    pub fn add_stylesheet(&mut self, sheet: &Stylesheet) {
        self.rules.extend(sheet.rules.iter().cloned());
    }

    pub fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub fn has_root_class(&self, class: &str) -> bool {
        self.root_classes.contains(class)
    }

    /// Number of changes applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn children(&self, container: &Container) -> &[Element] {
        self.containers
            .get(container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The switcher wrapper inside `container`, if one is present.
    pub fn plugin(&self, container: &Container) -> Option<&Element> {
        self.children(container)
            .iter()
            .find(|child| child.has_class(PLUGIN_CLASS))
    }

    fn thumbs(&self) -> Option<&Element> {
        self.containers
            .values()
            .flatten()
            .find_map(|child| child.find_class(THUMBS_CLASS))
    }

    fn thumbs_mut(&mut self) -> Option<&mut Element> {
        self.containers
            .values_mut()
            .flatten()
            .find_map(|child| child.find_class_mut(THUMBS_CLASS))
    }

    /// 1-based positions of thumbnails marked selected.
    pub fn selected_thumbs(&self) -> Vec<usize> {
        self.thumb_positions(|label| label.has_class(SELECTED_CLASS))
    }

    /// 1-based positions of thumbnails whose radio is checked.
    pub fn checked_thumbs(&self) -> Vec<usize> {
        self.thumb_positions(|label| {
            label
                .children_with_tag("input")
                .any(|input| input.attribute("checked").is_some())
        })
    }

    fn thumb_positions(&self, predicate: impl Fn(&Element) -> bool) -> Vec<usize> {
        self.thumbs()
            .map(|thumbs| {
                thumbs
                    .children_with_tag("label")
                    .enumerate()
                    .filter(|(_, label)| predicate(label))
                    .map(|(idx, _)| idx + 1)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Inline `display` of the thumbnail list, `None` when unset or absent.
    pub fn thumbs_display(&self) -> Option<&str> {
        self.thumbs()?
            .attribute("style")?
            .strip_prefix("display: ")
    }
}

impl PresentationSink for MemorySink {
    fn has_container(&self, container: &Container) -> bool {
        self.containers.contains_key(container)
    }

    fn is_attached(&self, container: &Container) -> bool {
        self.attached && self.plugin(container).is_some()
    }

    fn apply(&mut self, change: PresentationChange) -> Result<(), SinkError> {
        tracing::trace!(?change, "presentation change");
        match change {
            PresentationChange::InsertMarkup { container, markup } => {
                let Some(children) = self.containers.get_mut(&container) else {
                    return Err(SinkError::UnknownContainer(container));
                };
                children.insert(0, markup);
            }
            PresentationChange::RemoveMarkup { container } => {
                if let Some(children) = self.containers.get_mut(&container) {
                    if let Some(pos) = children.iter().position(|c| c.has_class(PLUGIN_CLASS)) {
                        children.remove(pos);
                    }
                }
            }
            PresentationChange::AddRootClass(class) => {
                self.root_classes.insert(class);
            }
            PresentationChange::RemoveRootClass(class) => {
                self.root_classes.remove(&class);
            }
            PresentationChange::ThumbState {
                position,
                selected,
                checked,
            } => {
                let thumbs = self
                    .thumbs_mut()
                    .ok_or(SinkError::MissingElement(THUMBS_CLASS))?;
                let label = thumbs
                    .children
                    .iter_mut()
                    .filter(|child| child.tag == "label")
                    .nth(position.wrapping_sub(1))
                    .ok_or(SinkError::MissingThumb(position))?;
                label.set_class(SELECTED_CLASS, selected);
                for input in label.children.iter_mut().filter(|c| c.tag == "input") {
                    input.set_attribute("checked", checked.then_some(""));
                }
            }
            PresentationChange::ThumbsDisplay(display) => {
                let thumbs = self
                    .thumbs_mut()
                    .ok_or(SinkError::MissingElement(THUMBS_CLASS))?;
                let style = format!("display: {}", display.css_value());
                thumbs.set_attribute("style", Some(&style));
            }
        }
        self.applied += 1;
        Ok(())
    }

    fn root_classes(&self) -> Vec<String> {
        self.root_classes.iter().cloned().collect()
    }

    fn computed_variable(&self, name: &str) -> Option<String> {
        // later rules win, class rules win over plain root rules
        let from_class = self
            .rules
            .iter()
            .rev()
            .filter(|rule| self.root_classes.iter().any(|c| rule.targets_class(c)))
            .find_map(|rule| rule.declaration(name));
        let from_root = || {
            self.rules
                .iter()
                .rev()
                .filter(|rule| rule.targets_root())
                .find_map(|rule| rule.declaration(name))
        };
        from_class.or_else(from_root).map(str::to_string)
    }
}
