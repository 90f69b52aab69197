//! Frame based transitions for list items.
//!
//! [`transition`] drives a step function from `0.0` to `1.0` over a duration, one
//! call per frame of a [`FrameClock`], checking a [`CancellationToken`] between
//! frames. [`VerticalListEaseOut`] uses it to grow and fade list items in and to
//! fade and collapse them out.
use std::{
    cell::{Cell, RefCell},
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

use futures::{
    FutureExt,
    future::{self, LocalBoxFuture},
};
use serde::{Deserialize, Serialize};

use crate::view::{ViewNode, Viewport};

/// Returned by an animation that was cancelled before it finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("animation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// A shared cancellation flag.
///
/// Clones share the flag. Once cancelled a token stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }

    pub fn ptr_eq(&self, other: &CancellationToken) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A future that resolves to a frame timestamp once something calls
/// [`NextFrame::resolve`].
#[derive(Clone, Default)]
pub struct NextFrame {
    ts: Rc<Cell<Option<f64>>>,
    waker: Rc<RefCell<Option<Waker>>>,
}

impl NextFrame {
    pub fn resolve(&self, ts: f64) {
        self.ts.set(Some(ts));
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

impl Future for NextFrame {
    type Output = f64;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(ts) = self.ts.take() {
            Poll::Ready(ts)
        } else {
            *self.waker.borrow_mut() = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

/// A source of animation frames.
pub trait FrameClock {
    /// The current time in milliseconds.
    fn now(&self) -> f64;

    /// Wait for the next frame, resolving to its timestamp in milliseconds.
    fn next_frame(&self) -> LocalBoxFuture<'static, f64>;
}

impl<C: FrameClock + ?Sized> FrameClock for Rc<C> {
    fn now(&self) -> f64 {
        self.as_ref().now()
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, f64> {
        self.as_ref().next_frame()
    }
}

/// A clock whose frames only arrive when [`ManualClock::advance`] is called.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
    waiting: Rc<RefCell<Vec<NextFrame>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward and deliver a frame to everything waiting on one.
    pub fn advance(&self, millis: f64) {
        let now = self.now.get() + millis;
        self.now.set(now);
        let waiting = std::mem::take(&mut *self.waiting.borrow_mut());
        for frame in waiting {
            frame.resolve(now);
        }
    }

    /// The number of futures waiting for a frame.
    pub fn waiting(&self) -> usize {
        self.waiting.borrow().len()
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, f64> {
        let frame = NextFrame::default();
        self.waiting.borrow_mut().push(frame.clone());
        frame.boxed_local()
    }
}

/// A clock that never waits, every frame is one interval after the last.
///
/// Transitions on this clock finish within a single poll, which is what a document
/// rendered off-screen wants.
#[derive(Clone)]
pub struct SteppingClock {
    now: Rc<Cell<f64>>,
    interval: f64,
}

impl Default for SteppingClock {
    fn default() -> Self {
        SteppingClock {
            now: Default::default(),
            interval: 1000.0 / 60.0,
        }
    }
}

impl SteppingClock {
    pub fn new(interval_millis: f64) -> Self {
        SteppingClock {
            now: Default::default(),
            interval: interval_millis.max(f64::EPSILON),
        }
    }
}

impl FrameClock for SteppingClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, f64> {
        let now = self.now.get() + self.interval;
        self.now.set(now);
        future::ready(now).boxed_local()
    }
}

/// Accelerating from zero velocity.
pub fn ease_in(t: f64) -> f64 {
    t * t
}

/// Decelerating to zero velocity.
pub fn ease_out(t: f64) -> f64 {
    t * (2.0 - t)
}

/// Call `step` once per frame with the elapsed fraction of `duration_millis`, ending
/// with a call of `1.0`.
///
/// Returns `Err(Cancelled)` as soon as `cancel` is observed between frames. Whatever
/// `step` did up to that point stays done.
pub async fn transition<C: FrameClock + ?Sized>(
    clock: &C,
    duration_millis: f64,
    mut step: impl FnMut(f64),
    cancel: &CancellationToken,
) -> Result<(), Cancelled> {
    let start = clock.now();
    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let now = clock.next_frame().await;
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let t = if duration_millis <= 0.0 {
            1.0
        } else {
            ((now - start) / duration_millis).clamp(0.0, 1.0)
        };
        step(t);
        if t >= 1.0 {
            return Ok(());
        }
    }
}

/// Animates the entry and exit of list items.
///
/// Both operations do their synchronous DOM work before returning, so `node` is
/// already in (or already out of) the DOM when the caller gets the future back. The
/// returned future drives the rest of the transition.
pub trait ListAnimator<N: ViewNode> {
    /// Insert `node` into `parent` before `reference` (or at the end) and animate it in.
    fn insert_before(
        &self,
        parent: &N,
        node: &N,
        reference: Option<&N>,
        cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, Result<(), Cancelled>>;

    /// Animate `node` out and then detach it.
    fn remove(&self, node: &N, cancel: CancellationToken)
    -> LocalBoxFuture<'static, Result<(), Cancelled>>;
}

/// A list animator that doesn't animate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl<N: ViewNode> ListAnimator<N> for Immediate {
    fn insert_before(
        &self,
        parent: &N,
        node: &N,
        reference: Option<&N>,
        _cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, Result<(), Cancelled>> {
        parent.insert_before(node, reference);
        future::ready(Ok(())).boxed_local()
    }

    fn remove(
        &self,
        node: &N,
        _cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, Result<(), Cancelled>> {
        node.detach();
        future::ready(Ok(())).boxed_local()
    }
}

/// Durations used by [`VerticalListEaseOut`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListAnimationConfig {
    pub insert_expand_millis: u32,
    pub insert_fade_millis: u32,
    pub remove_fade_millis: u32,
    pub remove_collapse_millis: u32,
}

impl Default for ListAnimationConfig {
    fn default() -> Self {
        ListAnimationConfig {
            insert_expand_millis: 150,
            insert_fade_millis: 200,
            remove_fade_millis: 200,
            remove_collapse_millis: 150,
        }
    }
}

/// Items grow to their natural height and then fade in. On the way out they fade
/// and then collapse.
pub struct VerticalListEaseOut<C> {
    clock: Rc<C>,
    config: ListAnimationConfig,
    viewport: Option<Rc<dyn Viewport>>,
}

impl<C: FrameClock + 'static> VerticalListEaseOut<C> {
    pub fn new(clock: C) -> Self {
        VerticalListEaseOut {
            clock: Rc::new(clock),
            config: ListAnimationConfig::default(),
            viewport: None,
        }
    }

    pub fn with_config(mut self, config: ListAnimationConfig) -> Self {
        self.config = config;
        self
    }

    /// Keep the viewport's bottom edge in place while items grow above it.
    pub fn with_viewport(mut self, viewport: Rc<dyn Viewport>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn config(&self) -> &ListAnimationConfig {
        &self.config
    }
}

fn px(value: f64) -> String {
    format!("{value}px")
}

impl<N: ViewNode, C: FrameClock + 'static> ListAnimator<N> for VerticalListEaseOut<C> {
    fn insert_before(
        &self,
        parent: &N,
        node: &N,
        reference: Option<&N>,
        cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, Result<(), Cancelled>> {
        node.set_style("opacity", "0");
        node.set_style("position", "absolute");
        node.set_style("width", "100%");
        parent.insert_before(node, reference);

        if node.offset_parent().as_ref() != Some(parent) {
            parent.set_style("position", "relative");
        }

        let natural_height = node.client_height();
        if natural_height == 0.0 || !node.is_visible() {
            node.remove_style("opacity");
            node.remove_style("width");
            node.remove_style("position");
            return future::ready(Ok(())).boxed_local();
        }

        node.set_style("height", "0px");
        node.remove_style("width");
        node.remove_style("position");

        // Only compensate when the reader is nearer the bottom than the top.
        let compensation = self.viewport.clone().and_then(|viewport| {
            let scroll_bottom = viewport.scroll_bottom();
            (scroll_bottom < viewport.scroll_y()).then_some((viewport, scroll_bottom))
        });

        let node = node.clone();
        let clock = self.clock.clone();
        let config = self.config;
        async move {
            let key = node.key();
            log::debug!("animating insertion of {key:?}");
            let result = async {
                transition(
                    &*clock,
                    config.insert_expand_millis as f64,
                    |t| {
                        node.set_style("height", &px(natural_height * ease_in(t)));
                        if let Some((viewport, scroll_bottom)) = &compensation {
                            viewport.scroll_by(viewport.scroll_bottom() - scroll_bottom);
                        }
                    },
                    &cancel,
                )
                .await?;
                node.remove_style("height");

                transition(
                    &*clock,
                    config.insert_fade_millis as f64,
                    |t| node.set_style("opacity", &ease_out(t).to_string()),
                    &cancel,
                )
                .await?;
                node.remove_style("opacity");
                Ok(())
            }
            .await;
            match &result {
                Ok(()) => log::debug!("inserted {key:?}"),
                Err(_) => log::debug!("insertion of {key:?} cancelled"),
            }
            result
        }
        .boxed_local()
    }

    fn remove(
        &self,
        node: &N,
        cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, Result<(), Cancelled>> {
        if !node.is_visible() {
            node.detach();
            return future::ready(Ok(())).boxed_local();
        }

        let node = node.clone();
        let clock = self.clock.clone();
        let config = self.config;
        async move {
            let key = node.key();
            log::debug!("animating removal of {key:?}");
            let result = async {
                let opacity = node.computed_opacity();
                if opacity != 0.0 {
                    transition(
                        &*clock,
                        config.remove_fade_millis as f64,
                        |t| node.set_style("opacity", &(opacity - opacity * ease_in(t)).to_string()),
                        &cancel,
                    )
                    .await?;
                }

                let height = node.client_height();
                if height != 0.0 {
                    transition(
                        &*clock,
                        config.remove_collapse_millis as f64,
                        |t| node.set_style("height", &px(height - height * ease_out(t))),
                        &cancel,
                    )
                    .await?;
                }

                node.detach();
                node.remove_style("opacity");
                node.remove_style("height");
                Ok(())
            }
            .await;
            match &result {
                Ok(()) => log::debug!("removed {key:?}"),
                Err(_) => log::debug!("removal of {key:?} cancelled"),
            }
            result
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_defaults_fill_gaps() {
        let config: ListAnimationConfig =
            serde_json::from_str(r#"{"remove_fade_millis": 50}"#).unwrap();
        assert_eq!(
            config,
            ListAnimationConfig {
                remove_fade_millis: 50,
                ..Default::default()
            }
        );
        let json = serde_json::to_value(ListAnimationConfig::default()).unwrap();
        assert_eq!(json["insert_expand_millis"], 150);
    }

    #[test]
    fn easing_endpoints() {
        for ease in [ease_in, ease_out] {
            assert_eq!(ease(0.0), 0.0);
            assert_eq!(ease(1.0), 1.0);
        }
        assert!(ease_in(0.5) < 0.5);
        assert!(ease_out(0.5) > 0.5);
    }

    #[test]
    fn stepping_transition_finishes_in_one_poll() {
        let clock = SteppingClock::new(25.0);
        let steps = RefCell::new(vec![]);
        let result = futures_lite::future::block_on(transition(
            &clock,
            100.0,
            |t| steps.borrow_mut().push(t),
            &CancellationToken::new(),
        ));
        assert_eq!(result, Ok(()));
        assert_eq!(*steps.borrow(), vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn zero_duration_steps_once() {
        let clock = SteppingClock::default();
        let steps = RefCell::new(vec![]);
        let result = futures_lite::future::block_on(transition(
            &clock,
            0.0,
            |t| steps.borrow_mut().push(t),
            &CancellationToken::new(),
        ));
        assert_eq!(result, Ok(()));
        assert_eq!(*steps.borrow(), vec![1.0]);
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod driven {
        use super::*;
        use crate::spawn::{run_until_stalled, spawn_local};

        fn spawn_result(
            fut: LocalBoxFuture<'static, Result<(), Cancelled>>,
        ) -> Rc<Cell<Option<Result<(), Cancelled>>>> {
            let result = Rc::new(Cell::new(None));
            spawn_local({
                let result = result.clone();
                async move { result.set(Some(fut.await)) }
            });
            run_until_stalled();
            result
        }

        #[test]
        fn manual_transition_and_cancel() {
            let clock = ManualClock::new();
            let cancel = CancellationToken::new();
            let steps = Rc::new(RefCell::new(vec![]));
            let result = spawn_result({
                let (clock, cancel, steps) = (clock.clone(), cancel.clone(), steps.clone());
                async move {
                    transition(&clock, 100.0, |t| steps.borrow_mut().push(t), &cancel).await
                }
                .boxed_local()
            });
            assert_eq!(clock.waiting(), 1);
            clock.advance(40.0);
            run_until_stalled();
            assert_eq!(*steps.borrow(), vec![0.4]);

            cancel.cancel();
            clock.advance(40.0);
            run_until_stalled();
            assert_eq!(*steps.borrow(), vec![0.4]);
            assert_eq!(result.get(), Some(Err(Cancelled)));
        }

        #[cfg(feature = "ssr")]
        mod list {
            use super::*;
            use crate::ssr::SsrNode;

            struct TestViewport {
                content: SsrNode,
                base: f64,
                inner: f64,
                y: Cell<f64>,
            }

            impl Viewport for TestViewport {
                fn scroll_height(&self) -> f64 {
                    self.base + self.content.client_height()
                }

                fn inner_height(&self) -> f64 {
                    self.inner
                }

                fn scroll_y(&self) -> f64 {
                    self.y.get()
                }

                fn scroll_by(&self, dy: f64) {
                    self.y.set(self.y.get() + dy);
                }
            }

            fn item(height: f64) -> SsrNode {
                let li = SsrNode::element("li").unwrap();
                li.set_layout_height(height);
                li
            }

            #[test]
            fn insert_grows_then_fades_in() {
                let clock = ManualClock::new();
                let animator = VerticalListEaseOut::new(clock.clone());
                let ul = SsrNode::element("ul").unwrap();
                let first = item(20.0);
                ul.append_child(&first);
                let li = item(20.0);

                let fut = animator.insert_before(&ul, &li, Some(&first), CancellationToken::new());
                assert_eq!(ul.child_nodes(), vec![li.clone(), first.clone()]);
                assert_eq!(ul.get_style("position").as_deref(), Some("relative"));
                assert_eq!(li.get_style("height").as_deref(), Some("0px"));
                assert_eq!(li.get_style("opacity").as_deref(), Some("0"));
                assert_eq!(li.get_style("position"), None);

                let result = spawn_result(fut);
                clock.advance(75.0);
                run_until_stalled();
                assert_eq!(li.get_style("height").as_deref(), Some("5px"));
                clock.advance(75.0);
                run_until_stalled();
                assert_eq!(li.get_style("height"), None);
                assert_eq!(li.get_style("opacity").as_deref(), Some("0"));

                clock.advance(100.0);
                run_until_stalled();
                assert_eq!(li.get_style("opacity").as_deref(), Some("0.75"));
                clock.advance(100.0);
                run_until_stalled();
                assert_eq!(li.get_style("opacity"), None);
                assert_eq!(result.get(), Some(Ok(())));
            }

            #[test]
            fn insert_without_height_is_instant() {
                let animator = VerticalListEaseOut::new(ManualClock::new());
                let ul = SsrNode::element("ul").unwrap();
                let li = item(0.0);
                let result = spawn_result(animator.insert_before(
                    &ul,
                    &li,
                    None,
                    CancellationToken::new(),
                ));
                assert_eq!(result.get(), Some(Ok(())));
                assert_eq!(ul.child_nodes(), vec![li.clone()]);
                for property in ["opacity", "position", "width", "height"] {
                    assert_eq!(li.get_style(property), None);
                }
            }

            #[test]
            fn insert_keeps_scroll_position() {
                let clock = ManualClock::new();
                let ul = SsrNode::element("ul").unwrap();
                let li = item(20.0);
                let viewport = Rc::new(TestViewport {
                    content: li.clone(),
                    base: 1000.0,
                    inner: 100.0,
                    y: Cell::new(800.0),
                });
                let animator =
                    VerticalListEaseOut::new(clock.clone()).with_viewport(viewport.clone());
                let result =
                    spawn_result(animator.insert_before(&ul, &li, None, CancellationToken::new()));
                clock.advance(150.0);
                run_until_stalled();
                assert_eq!(viewport.y.get(), 820.0);
                clock.advance(200.0);
                run_until_stalled();
                assert_eq!(result.get(), Some(Ok(())));
            }

            #[test]
            fn remove_fades_collapses_and_detaches() {
                let clock = ManualClock::new();
                let animator = VerticalListEaseOut::new(clock.clone());
                let ul = SsrNode::element("ul").unwrap();
                let li = item(40.0);
                ul.append_child(&li);

                let result = spawn_result(animator.remove(&li, CancellationToken::new()));
                clock.advance(200.0);
                run_until_stalled();
                assert_eq!(li.get_style("opacity").as_deref(), Some("0"));
                assert_eq!(li.parent(), Some(ul.clone()));

                clock.advance(150.0);
                run_until_stalled();
                assert_eq!(li.parent(), None);
                assert_eq!(li.get_style("height"), None);
                assert_eq!(result.get(), Some(Ok(())));
            }

            #[test]
            fn remove_invisible_detaches_immediately() {
                let animator = VerticalListEaseOut::new(ManualClock::new());
                let ul = SsrNode::element("ul").unwrap();
                let li = item(0.0);
                ul.append_child(&li);
                let fut = animator.remove(&li, CancellationToken::new());
                assert_eq!(li.parent(), None);
                assert_eq!(futures_lite::future::block_on(fut), Ok(()));
            }

            #[test]
            fn cancelled_removal_leaves_node_in_place() {
                let clock = ManualClock::new();
                let animator = VerticalListEaseOut::new(clock.clone());
                let ul = SsrNode::element("ul").unwrap();
                let li = item(40.0);
                ul.append_child(&li);
                let cancel = CancellationToken::new();
                let result = spawn_result(animator.remove(&li, cancel.clone()));
                clock.advance(100.0);
                run_until_stalled();
                cancel.cancel();
                clock.advance(100.0);
                run_until_stalled();
                assert_eq!(result.get(), Some(Err(Cancelled)));
                assert_eq!(li.parent(), Some(ul));
                assert_eq!(li.get_style("opacity").as_deref(), Some("0.75"));
            }
        }
    }
}
