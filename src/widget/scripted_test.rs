use serde_json::json;
use tokio::sync::mpsc;

use super::*;

fn watched(widget: &ScriptedWidget) -> mpsc::UnboundedReceiver<WidgetEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    widget.watch(WatchOptions { logged_in_user: Some("a@test.com".into()) }, WidgetEvents::new(tx));
    rx
}

#[test]
fn watch_records_options_and_signals_ready() {
    let widget = ScriptedWidget::default();
    let mut rx = watched(&widget);

    assert_eq!(widget.watch_options().unwrap().logged_in_user.as_deref(), Some("a@test.com"));
    assert_eq!(rx.try_recv().unwrap(), WidgetEvent::Ready);
}

#[test]
fn request_answers_with_assertion() {
    let widget = ScriptedWidget::new("assertion-token");
    let mut rx = watched(&widget);
    let _ = rx.try_recv();

    let args = json!({"siteName": "Example"}).as_object().cloned().unwrap();
    widget.request(&args);

    assert_eq!(widget.requests(), vec![args]);
    assert_eq!(rx.try_recv().unwrap(), WidgetEvent::Login(Some("assertion-token".into())));
}

#[test]
fn logout_answers_with_logout_event() {
    let widget = ScriptedWidget::default();
    let mut rx = watched(&widget);
    let _ = rx.try_recv();

    widget.logout();

    assert_eq!(widget.logout_count(), 1);
    assert_eq!(rx.try_recv().unwrap(), WidgetEvent::Logout);
}

#[test]
fn without_assertion_answers_null() {
    let widget = ScriptedWidget::without_assertion();
    let mut rx = watched(&widget);
    let _ = rx.try_recv();

    widget.request(&RequestArgs::new());
    assert_eq!(rx.try_recv().unwrap(), WidgetEvent::Login(None));
}

#[test]
fn silent_widget_records_but_never_fires() {
    let widget = ScriptedWidget::silent();
    let mut rx = watched(&widget);

    widget.request(&RequestArgs::new());
    widget.logout();

    assert_eq!(widget.requests().len(), 1);
    assert_eq!(widget.logout_count(), 1);
    assert!(rx.try_recv().is_err());
}

#[test]
fn emit_before_watch_is_dropped() {
    let widget = ScriptedWidget::silent();
    assert!(!widget.emit(WidgetEvent::Logout));
}

#[test]
fn emit_after_receiver_dropped_reports_closed() {
    let widget = ScriptedWidget::silent();
    drop(watched(&widget));
    assert!(!widget.emit(WidgetEvent::Login(Some("a".into()))));
}
