//! Named attribute handlers.
//!
//! When an attribute is applied to a node, a handler registered under the
//! attribute's name takes precedence over the generic attribute binding. Each node
//! type has its own registry per thread, pre-populated with:
//!
//! * `class` - a space-delimited class list, see [`bind_class_list`].
//! * `style` - inline style declarations or a style string.
//! * `pressed` - an alias that binds `aria-pressed`.
use std::{collections::HashMap, rc::Rc};

use crate::{
    bind::{Bind, apply_style, bind_attribute, bind_class_list, bind_with, parse_style},
    builder::{AttrValue, Attrs},
    str::Str,
    sync::PerType,
    view::ViewNode,
};

/// A handler called with the target node, the attribute's value and every attribute
/// being applied alongside it.
pub type AttributeHandler<N> = Rc<dyn Fn(&N, &AttrValue<N>, &Attrs<N>) -> anyhow::Result<()>>;

struct Registry<N: ViewNode> {
    handlers: HashMap<Str, AttributeHandler<N>>,
}

thread_local! {
    static REGISTRIES: PerType = PerType::default();
}

fn expect_bind<'a, N: ViewNode>(name: &str, value: &'a AttrValue<N>) -> anyhow::Result<&'a Bind> {
    match value {
        AttrValue::Bind(bind) => Ok(bind),
        AttrValue::Handler(_) => anyhow::bail!("'{name}' expects a value, not an event handler"),
        AttrValue::Style(_) => anyhow::bail!("'{name}' expects a value, not style declarations"),
    }
}

fn class_handler<N: ViewNode>(node: &N, value: &AttrValue<N>, _: &Attrs<N>) -> anyhow::Result<()> {
    bind_class_list(node, expect_bind("class", value)?.clone());
    Ok(())
}

fn style_handler<N: ViewNode>(node: &N, value: &AttrValue<N>, _: &Attrs<N>) -> anyhow::Result<()> {
    match value {
        AttrValue::Style(declarations) => apply_style(node, declarations),
        AttrValue::Bind(bind) => {
            let target = node.clone();
            bind_with(node, bind.clone(), move |style, may_old| {
                let declarations = parse_style(&style.to_text());
                if let Some(old) = may_old {
                    for (property, _) in parse_style(&old.to_text()) {
                        if !declarations.iter().any(|(p, _)| *p == property) {
                            target.remove_style(&property);
                        }
                    }
                }
                apply_style(&target, &declarations);
            });
        }
        AttrValue::Handler(_) => anyhow::bail!("'style' expects declarations, not an event handler"),
    }
    Ok(())
}

fn pressed_handler<N: ViewNode>(node: &N, value: &AttrValue<N>, _: &Attrs<N>) -> anyhow::Result<()> {
    bind_attribute(node, "aria-pressed", expect_bind("pressed", value)?.clone());
    Ok(())
}

impl<N: ViewNode> Registry<N> {
    fn with_defaults() -> Self {
        let mut handlers: HashMap<Str, AttributeHandler<N>> = HashMap::new();
        handlers.insert("class".into(), Rc::new(class_handler::<N>));
        handlers.insert("style".into(), Rc::new(style_handler::<N>));
        handlers.insert("pressed".into(), Rc::new(pressed_handler::<N>));
        Registry { handlers }
    }
}

fn visit_registry<N: ViewNode, X>(f: impl FnOnce(&mut Registry<N>) -> X) -> X {
    REGISTRIES.with(|registries| registries.visit(Registry::<N>::with_defaults, f))
}

/// Register a handler for attributes named `name` on nodes of type `N`.
///
/// Returns the handler it replaced, if any.
pub fn register_attribute_handler<N: ViewNode>(
    name: impl Into<Str>,
    handler: impl Fn(&N, &AttrValue<N>, &Attrs<N>) -> anyhow::Result<()> + 'static,
) -> Option<AttributeHandler<N>> {
    let name = name.into();
    log::trace!("registering attribute handler '{name}'");
    visit_registry(|registry: &mut Registry<N>| registry.handlers.insert(name, Rc::new(handler)))
}

/// Remove the handler for `name`, returning it.
pub fn unregister_attribute_handler<N: ViewNode>(name: &str) -> Option<AttributeHandler<N>> {
    visit_registry(|registry: &mut Registry<N>| registry.handlers.remove(name))
}

/// The handler registered for `name`, if any.
pub fn attribute_handler<N: ViewNode>(name: &str) -> Option<AttributeHandler<N>> {
    visit_registry(|registry: &mut Registry<N>| registry.handlers.get(name).cloned())
}

#[cfg(all(test, feature = "ssr"))]
mod test {
    use std::cell::RefCell;

    use super::*;
    use crate::{builder::apply_attributes, observable::Observable, ssr::SsrNode};

    fn element(tag: &str) -> SsrNode {
        SsrNode::element(tag).unwrap()
    }

    #[test]
    fn defaults_are_registered() {
        for name in ["class", "style", "pressed"] {
            assert!(attribute_handler::<SsrNode>(name).is_some(), "{name}");
        }
        assert!(attribute_handler::<SsrNode>("title").is_none());
    }

    #[test]
    fn pressed_binds_aria_pressed() {
        let button = element("button");
        let pressed = Observable::new(false);
        apply_attributes(&button, &Attrs::new().with("pressed", &pressed)).unwrap();
        assert_eq!(button.get_attribute("aria-pressed"), None);
        pressed.set(true);
        assert_eq!(button.get_attribute("aria-pressed").as_deref(), Some("true"));
        assert_eq!(button.get_attribute("pressed"), None);
    }

    #[test]
    fn style_from_string_and_declarations() {
        let div = element("div");
        let style = Observable::new("color: red; margin: 0");
        apply_attributes(&div, &Attrs::new().with("style", &style)).unwrap();
        assert_eq!(div.get_style("color").as_deref(), Some("red"));
        style.set("color: blue");
        assert_eq!(div.get_style("color").as_deref(), Some("blue"));
        assert_eq!(div.get_style("margin"), None);

        let span = element("span");
        apply_attributes(&span, &Attrs::new().with_style([("display", "none")])).unwrap();
        assert_eq!(span.get_style("display").as_deref(), Some("none"));
    }

    #[test]
    fn custom_handlers_see_every_attribute() {
        let seen = Rc::new(RefCell::new(vec![]));
        register_attribute_handler::<SsrNode>("label", {
            let seen = seen.clone();
            move |node: &SsrNode, value: &AttrValue<SsrNode>, attrs: &Attrs<SsrNode>| {
                let Some(AttrValue::Bind(Bind::Static(v))) = attrs.get("id") else {
                    anyhow::bail!("label needs an id");
                };
                node.set_attribute("aria-labelledby", &v.to_text());
                seen.borrow_mut().push(matches!(value, AttrValue::Bind(_)));
                Ok(())
            }
        });

        let input = element("input");
        apply_attributes(&input, &Attrs::new().with("id", "x").with("label", "Name")).unwrap();
        assert_eq!(input.get_attribute("aria-labelledby").as_deref(), Some("x"));
        assert_eq!(input.get_attribute("label"), None);
        assert_eq!(*seen.borrow(), vec![true]);

        let err = apply_attributes(&element("input"), &Attrs::new().with("label", "Name"));
        assert!(err.is_err());

        assert!(unregister_attribute_handler::<SsrNode>("label").is_some());
        let plain = element("input");
        apply_attributes(&plain, &Attrs::new().with("label", "Name")).unwrap();
        assert_eq!(plain.get_attribute("label").as_deref(), Some("Name"));
    }

    #[test]
    fn class_rejects_handlers() {
        let div = element("div");
        let attrs = Attrs::<SsrNode>::new().on("class", |_: &crate::ssr::SsrEvent| {});
        assert!(apply_attributes(&div, &attrs).is_err());
    }
}
