//! Live bindings between nodes and value sources.
//!
//! Every function here takes anything that converts into a [`Bind`]. Static values
//! are written once. Observables and derived closures are written once immediately
//! and again on every change, until the target node is disposed with
//! [`dispose_subtree`](crate::dispose::dispose_subtree).
use std::rc::Rc;

use crate::{
    dispose::register_disposal,
    observable::{Computed, Observable, Source},
    str::{Str, class_tokens},
    value::Value,
    view::ViewNode,
};

/// A value source for a binding.
#[derive(Clone)]
pub enum Bind {
    /// A value that never changes.
    Static(Value),
    /// An observable the binding subscribes to. The binding does not own it.
    Observable(Rc<dyn Source<Value>>),
    /// A closure wrapped in a [`Computed`] that the binding owns.
    Derived(Rc<dyn Fn() -> Value>),
}

impl std::fmt::Debug for Bind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bind::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Bind::Observable(source) => f.debug_tuple("Observable").field(&source.current()).finish(),
            Bind::Derived(_) => f.write_str("Derived"),
        }
    }
}

impl Default for Bind {
    fn default() -> Self {
        Bind::Static(Value::Null)
    }
}

/// Bind to a value derived from other observables.
///
/// ```rust
/// use mogwai_bind::prelude::*;
///
/// let name = Observable::new("world");
/// let greeting: Bind = derive({
///     let name = name.clone();
///     move || format!("hello {}", name.get())
/// });
/// ```
pub fn derive<X: Into<Value>>(f: impl Fn() -> X + 'static) -> Bind {
    Bind::Derived(Rc::new(move || f().into()))
}

impl From<Value> for Bind {
    fn from(value: Value) -> Self {
        Bind::Static(value)
    }
}

impl From<&'static str> for Bind {
    fn from(s: &'static str) -> Self {
        Bind::Static(s.into())
    }
}

impl From<String> for Bind {
    fn from(s: String) -> Self {
        Bind::Static(s.into())
    }
}

impl From<Str> for Bind {
    fn from(s: Str) -> Self {
        Bind::Static(s.into())
    }
}

impl From<bool> for Bind {
    fn from(b: bool) -> Self {
        Bind::Static(b.into())
    }
}

impl From<()> for Bind {
    fn from(_: ()) -> Self {
        Bind::Static(Value::Null)
    }
}

macro_rules! number_impl {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Bind {
                fn from(n: $ty) -> Self {
                    Bind::Static(n.into())
                }
            }
        )*
    };
}

number_impl!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<T: Into<Value>> From<Option<T>> for Bind {
    fn from(may_t: Option<T>) -> Self {
        Bind::Static(may_t.into())
    }
}

impl<T> From<Observable<T>> for Bind
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(observable: Observable<T>) -> Self {
        Bind::Observable(Rc::new(observable))
    }
}

impl<T> From<&Observable<T>> for Bind
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(observable: &Observable<T>) -> Self {
        Bind::Observable(Rc::new(observable.clone()))
    }
}

impl<T> From<Computed<T>> for Bind
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(computed: Computed<T>) -> Self {
        Bind::Observable(Rc::new(computed))
    }
}

/// Drive `apply` from `source`, registering any subscription against `node`.
///
/// `apply` receives the new value and, for updates, the previous one.
pub(crate) fn bind_with<N: ViewNode>(
    node: &N,
    source: impl Into<Bind>,
    mut apply: impl FnMut(&Value, Option<&Value>) + 'static,
) {
    match source.into() {
        Bind::Static(value) => apply(&value, None),
        Bind::Observable(source) => {
            apply(&source.current(), None);
            let subscription =
                source.subscribe_boxed(Box::new(move |new, old| apply(new, Some(old))));
            register_disposal(node, subscription.disposer());
        }
        Bind::Derived(f) => {
            let computed = Computed::new(move || f());
            apply(&computed.get_untracked(), None);
            let _subscription = computed.subscribe(move |new, old| apply(new, Some(old)));
            register_disposal(node, computed.disposer());
        }
    }
}

/// Keep the node's text content equal to the stringified value.
pub fn bind_text<N: ViewNode>(node: &N, source: impl Into<Bind>) {
    let target = node.clone();
    bind_with(node, source, move |value, _| {
        target.set_text_content(&value.to_text())
    });
}

fn write_attribute<N: ViewNode>(node: &N, name: &str, value: &Value) {
    match value {
        Value::Bool(true) => node.set_attribute(name, "true"),
        value if value.is_truthy() => node.set_attribute(name, &value.to_text()),
        _ => node.remove_attribute(name),
    }
}

/// Keep an attribute in sync with a value.
///
/// Falsy values remove the attribute, `true` sets it to `"true"` and anything else
/// sets the stringified value.
pub fn bind_attribute<N: ViewNode>(node: &N, name: impl Into<Str>, source: impl Into<Bind>) {
    let name = name.into();
    let target = node.clone();
    bind_with(node, source, move |value, _| {
        write_attribute(&target, &name, value)
    });
}

/// Add `class` while the value is truthy and remove it otherwise.
pub fn bind_class<N: ViewNode>(node: &N, class: impl Into<Str>, source: impl Into<Bind>) {
    let class = class.into();
    let target = node.clone();
    bind_with(node, source, move |value, _| {
        if value.is_truthy() {
            target.add_class(&class);
        } else {
            target.remove_class(&class);
        }
    });
}

/// Bind a space-delimited list of classes.
///
/// On every update the classes that left the list are removed and the new ones are
/// added. Classes added by anything else are left alone.
pub fn bind_class_list<N: ViewNode>(node: &N, source: impl Into<Bind>) {
    let target = node.clone();
    bind_with(node, source, move |value, may_old| {
        let classes = value.to_text();
        if let Some(old) = may_old {
            let old = old.to_text();
            for class in class_tokens(&old) {
                if !class_tokens(&classes).any(|c| c == class) {
                    target.remove_class(class);
                }
            }
        }
        for class in class_tokens(&classes) {
            target.add_class(class);
        }
    });
}

/// Keep one inline style property in sync with a value.
///
/// `Null` and the empty string remove the property.
pub fn bind_style<N: ViewNode>(node: &N, property: impl Into<Str>, source: impl Into<Bind>) {
    let property = property.into();
    let target = node.clone();
    bind_with(node, source, move |value, _| match value {
        Value::Null => target.remove_style(&property),
        Value::Text(s) if s.is_empty() => target.remove_style(&property),
        value => target.set_style(&property, &value.to_text()),
    });
}

/// Assign each declaration to the node's inline style.
///
/// Empty values remove their property.
pub fn apply_style<N: ViewNode>(node: &N, declarations: &[(Str, Str)]) {
    for (property, value) in declarations {
        if value.is_empty() {
            node.remove_style(property);
        } else {
            node.set_style(property, value);
        }
    }
}

/// Parse a `style` attribute string into declarations.
pub fn parse_style(style: &str) -> Vec<(Str, Str)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim();
            if property.is_empty() {
                return None;
            }
            Some((
                Str::from(property.to_owned()),
                Str::from(value.trim().to_owned()),
            ))
        })
        .collect()
}

#[cfg(all(test, feature = "ssr"))]
mod test {
    use super::*;
    use crate::{dispose::dispose_subtree, ssr::SsrNode};

    fn element(tag: &str) -> SsrNode {
        SsrNode::element(tag).unwrap()
    }

    #[test]
    fn falsy_attributes_are_absent() {
        let div = element("div");
        for falsy in [Bind::from(false), Bind::from(()), Bind::from(""), Bind::from(0)] {
            div.set_attribute("data-x", "present");
            bind_attribute(&div, "data-x", falsy);
            assert_eq!(div.get_attribute("data-x"), None);
        }
        bind_attribute(&div, "hidden", true);
        assert_eq!(div.get_attribute("hidden").as_deref(), Some("true"));
        bind_attribute(&div, "tabindex", -1);
        assert_eq!(div.get_attribute("tabindex").as_deref(), Some("-1"));
    }

    #[test]
    fn observable_attribute_follows_and_stops() {
        let div = element("div");
        let title = Observable::new(Value::from("first"));
        bind_attribute(&div, "title", &title);
        assert_eq!(div.get_attribute("title").as_deref(), Some("first"));
        title.set(Value::Null);
        assert_eq!(div.get_attribute("title"), None);
        title.set(true.into());
        assert_eq!(div.get_attribute("title").as_deref(), Some("true"));

        dispose_subtree(&div);
        assert_eq!(title.listener_count(), 0);
        title.set("late".into());
        assert_eq!(div.get_attribute("title").as_deref(), Some("true"));
    }

    #[test]
    fn text_from_observable_and_static() {
        let p = element("p");
        let count = Observable::new(1u32);
        bind_text(&p, count.clone());
        assert_eq!(p.text_content(), "1");
        count.set(2);
        assert_eq!(p.text_content(), "2");

        let q = element("p");
        bind_text(&q, None::<&'static str>);
        assert_eq!(q.text_content(), "");
    }

    #[test]
    fn derived_class_flag_owns_its_computed() {
        let div = element("div");
        let count = Observable::new(0);
        bind_class(&div, "busy", derive({
            let count = count.clone();
            move || count.get() > 0
        }));
        assert!(!div.has_class("busy"));
        count.set(3);
        assert!(div.has_class("busy"));
        assert_eq!(count.listener_count(), 1);

        dispose_subtree(&div);
        assert_eq!(count.listener_count(), 0);
        count.set(0);
        assert!(div.has_class("busy"));
    }

    #[test]
    fn class_list_swaps_tokens_and_keeps_others() {
        let div = element("div");
        div.add_class("keep");
        let classes = Observable::new("a b");
        bind_class_list(&div, &classes);
        assert!(div.has_class("a") && div.has_class("b"));

        classes.set("b c");
        assert!(!div.has_class("a"));
        assert!(div.has_class("b"));
        assert!(div.has_class("c"));
        assert!(div.has_class("keep"));

        bind_class_list(&div, "  d  e ");
        assert!(div.has_class("d") && div.has_class("e"));
    }

    #[test]
    fn style_binding() {
        let div = element("div");
        let opacity = Observable::new(Value::from(0));
        bind_style(&div, "opacity", &opacity);
        assert_eq!(div.get_style("opacity").as_deref(), Some("0"));
        opacity.set("".into());
        assert_eq!(div.get_style("opacity"), None);
        opacity.set(0.5.into());
        assert_eq!(div.get_style("opacity").as_deref(), Some("0.5"));
    }

    #[test]
    fn style_declarations() {
        let div = element("div");
        let declarations = parse_style("color: red; ;margin:0 auto;bogus");
        assert_eq!(
            declarations,
            vec![
                (Str::from("color"), Str::from("red")),
                (Str::from("margin"), Str::from("0 auto")),
            ]
        );
        apply_style(&div, &declarations);
        apply_style(&div, &[("color".into(), "".into())]);
        assert_eq!(div.get_style("color"), None);
        assert_eq!(div.get_style("margin").as_deref(), Some("0 auto"));
    }
}
