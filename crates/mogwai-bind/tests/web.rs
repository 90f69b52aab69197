#![cfg(all(target_arch = "wasm32", feature = "web"))]
use std::{cell::Cell, rc::Rc};

use mogwai_bind::{animate::Immediate, prelude::*, reconcile::set_list_animator};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn html(node: &web_sys::Node) -> String {
    node.dyn_ref::<web_sys::Element>()
        .map(|el| el.outer_html())
        .unwrap_or_default()
}

fn div(attrs: Attrs<web_sys::Node>, children: Vec<Child<web_sys::Node>>) -> web_sys::Node {
    build("div", attrs, children).unwrap().unwrap().node()
}

#[wasm_bindgen_test]
fn builds_and_binds() {
    let _ = mogwai_bind::web::init_logging(log::Level::Trace);

    let count = Observable::new(0);
    let active = Observable::new(false);
    let node = div(
        Attrs::new().with("class", derive({
            let active = active.clone();
            move || if active.get() { "item active" } else { "item" }
        })),
        children!["count: ", count.clone()],
    );
    assert_eq!(html(&node), r#"<div class="item">count: 0</div>"#);

    count.set(2);
    active.set(true);
    assert_eq!(html(&node), r#"<div class="item active">count: 2</div>"#);

    dispose_subtree(&node);
    count.set(3);
    assert_eq!(html(&node), r#"<div class="item active">count: 2</div>"#);
}

#[wasm_bindgen_test]
fn event_handlers_are_properties() {
    let clicks = Rc::new(Cell::new(0));
    let button = build(
        "button",
        Attrs::<web_sys::Node>::new().on("onclick", {
            let clicks = clicks.clone();
            move |_: &web_sys::Event| clicks.set(clicks.get() + 1)
        }),
        children!["click"],
    )
    .unwrap()
    .unwrap()
    .node();
    button.unchecked_ref::<web_sys::HtmlElement>().click();
    button.unchecked_ref::<web_sys::HtmlElement>().click();
    assert_eq!(clicks.get(), 2);
}

#[wasm_bindgen_test]
fn styles_and_unknown_tags() {
    let node = div(Attrs::new().with_style([("color", "red")]), vec![]);
    assert_eq!(node.get_style("color").as_deref(), Some("red"));
    node.set_style("color", "");
    assert_eq!(node.get_style("color"), None);

    let rejected = build::<web_sys::Node>("not a tag", Attrs::new(), vec![]).unwrap();
    assert!(rejected.is_none());
}

#[wasm_bindgen_test]
fn lists_follow_the_array() {
    set_list_animator::<web_sys::Node>(Rc::new(Immediate));
    let items: ObservableArray<web_sys::Node> = ["a", "b"]
        .into_iter()
        .map(|s| web_sys::Node::text(s))
        .collect();
    let list = div(Attrs::new(), children![items.clone()]);
    assert_eq!(ViewNode::text_content(&list), "ab");

    items.push(web_sys::Node::text("c"));
    items.move_item(2, 0);
    assert_eq!(ViewNode::text_content(&list), "cab");

    items.remove(1, 1);
    assert_eq!(ViewNode::text_content(&list), "cb");
}

#[wasm_bindgen_test]
async fn default_animator_settles() {
    let body: web_sys::Node = web_sys::window()
        .unwrap()
        .document()
        .unwrap()
        .body()
        .unwrap()
        .into();
    let container = div(Attrs::new(), vec![]);
    ViewNode::append_child(&body, &container);

    let animator = web_sys::Node::default_list_animator();
    let item = div(Attrs::new(), children!["hello"]);
    animator
        .insert_before(&container, &item, None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(item.get_style("opacity"), None);
    assert_eq!(item.get_style("height"), None);

    animator.remove(&item, CancellationToken::new()).await.unwrap();
    assert!(item.parent().is_none());
    container.detach();
}
