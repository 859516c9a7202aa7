use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use defer_sdk::prelude::*;
use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use tokio::time::{sleep, Instant};

struct Theme(&'static str);

fn delayed<T: Send + 'static>(ms: u64, value: T) -> impl std::future::Future<Output = anyhow::Result<T>> {
    async move {
        sleep(Duration::from_millis(ms)).await;
        Ok(value)
    }
}

fn resolve_after(ms: u64) -> Defer<&'static str> {
    Defer::new(
        delayed(ms, "Resolve"),
        |text: &'static str| Html::new(format!("<div>{}</div>", text)).boxed(),
        || Text::new("loading").boxed(),
    )
}

async fn render(settings: RenderSettings, body: impl Node + 'static) -> String {
    collect_to_string(render_document(settings, body))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn fast_fragment_renders_inline() {
    let html = render(RenderSettings::new(), resolve_after(1)).await;

    assert!(html.contains("<div>Resolve</div>"));
    assert!(!html.contains("loading"));
    assert!(!html.contains(TEMPLATE_ATTRIBUTE));
    assert!(html.ends_with("<div>Resolve</div></body></html>"));
}

#[tokio::test(start_paused = true)]
async fn slow_fragment_streams_fallback_then_patch() {
    let html = render(RenderSettings::new(), resolve_after(20)).await;

    let placeholder = html
        .find(r#"<div style="display: contents" data-deferred-slot="slot-0">loading</div>"#)
        .unwrap();
    let patch = html
        .find(r#"<template data-deferred-template="slot-0"><div>Resolve</div></template>"#)
        .unwrap();
    assert!(placeholder < patch);
    assert_eq!(html.matches(r#"data-deferred-slot="slot-0""#).count(), 1);
    assert_eq!(html.matches(r#"data-deferred-template="slot-0""#).count(), 1);
    assert_eq!(html.matches("loading").count(), 1);
    assert_eq!(html.matches(&relocation_script("slot-0")).count(), 1);
    assert!(html.ends_with("</script></body></html>"));
}

#[tokio::test]
async fn custom_template_replaces_document() {
    let settings = RenderSettings::new().with_template("<html>{{body}}</html>");
    let html = render(settings, Html::new("<div>Hello</div>")).await;
    assert_eq!(html, "<html><div>Hello</div></html>");
}

#[tokio::test(start_paused = true)]
async fn deferred_fragment_sees_provided_values() {
    let body = Provide::new(
        Theme("dark"),
        Defer::new(
            delayed(20, ()),
            |_: ()| -> BoxNode {
                Consume::new(|theme: Option<&Theme>| -> BoxNode {
                    Text::new(theme.map(|t| t.0).unwrap_or("none")).boxed()
                })
                .boxed()
            },
            || Text::new("loading").boxed(),
        ),
    );

    let html = render(RenderSettings::new(), body).await;
    assert!(html.contains(r#"<template data-deferred-template="slot-0">dark</template>"#));
}

#[tokio::test(start_paused = true)]
async fn failed_fragment_sees_provided_values() {
    let failing = async {
        sleep(Duration::from_millis(20)).await;
        Err::<(), _>(anyhow::anyhow!("backend down"))
    };
    let body = Provide::new(
        Theme("dark"),
        Defer::new(
            failing,
            |_: ()| Text::new("never").boxed(),
            || Text::new("loading").boxed(),
        )
        .on_error(|error: anyhow::Error| -> BoxNode {
            let message = error.to_string();
            Consume::new(move |theme: Option<&Theme>| -> BoxNode {
                Text::new(format!("{} ({})", message, theme.map(|t| t.0).unwrap_or("none"))).boxed()
            })
            .boxed()
        }),
    );

    let html = render(RenderSettings::new(), body).await;
    assert!(html.contains(">backend down (dark)</template>"));
    assert!(!html.contains("never"));
}

#[tokio::test(start_paused = true)]
async fn failed_fragment_without_handler_renders_builtin_error() {
    let body = Defer::new(
        async {
            sleep(Duration::from_millis(20)).await;
            Err::<(), _>(anyhow::anyhow!("<timeout>"))
        },
        |_: ()| Text::new("never").boxed(),
        || Text::new("loading").boxed(),
    );

    let html = render(RenderSettings::new(), body).await;
    assert!(html.contains(
        r#"<template data-deferred-template="slot-0"><div class="deferred-error">&lt;timeout&gt;</div></template>"#
    ));
}

#[tokio::test(start_paused = true)]
async fn patches_arrive_in_completion_order() {
    let body = Fragment::new()
        .child(resolve_after(40))
        .child(resolve_after(20));

    let chunks: Vec<Chunk> = render_document(RenderSettings::new(), body)
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    let slots: Vec<&str> = chunks.iter().filter_map(Chunk::slot).collect();
    assert_eq!(slots, ["slot-1", "slot-0"]);
}

#[tokio::test(start_paused = true)]
async fn nested_fragment_registers_with_same_document() {
    let body = Defer::new(
        delayed(20, ()),
        |_: ()| -> BoxNode {
            Element::new("section")
                .child(resolve_after(30))
                .boxed()
        },
        || Text::new("outer loading").boxed(),
    );

    let html = render(RenderSettings::new(), body).await;

    let outer = html
        .find(r#"<template data-deferred-template="slot-0"><section><div style="display: contents" data-deferred-slot="slot-1">loading</div></section></template>"#)
        .unwrap();
    let inner = html
        .find(r#"<template data-deferred-template="slot-1"><div>Resolve</div></template>"#)
        .unwrap();
    assert!(outer < inner);
}

#[tokio::test(start_paused = true)]
async fn head_fragment_is_awaited_inline() {
    let head = DefaultHead::new().with_title("Shop").child(Defer::new(
        delayed(50, "app.css"),
        |href: &'static str| Html::new(format!(r#"<link rel="stylesheet" href="{}">"#, href)).boxed(),
        || Text::new("loading").boxed(),
    ));
    let settings = RenderSettings::new().with_head(head);

    let html = render(settings, Text::new("body")).await;
    assert!(html.contains(r#"<title>Shop</title><link rel="stylesheet" href="app.css"></head>"#));
    assert!(!html.contains(SLOT_ATTRIBUTE));
}

#[tokio::test(start_paused = true)]
async fn head_and_body_render_concurrently() {
    let head = Defer::new(
        delayed(50, "<title>slow</title>"),
        |html: &'static str| Html::new(html).boxed(),
        || Text::new("").boxed(),
    );
    let body = Defer::new(
        delayed(50, "body"),
        |text: &'static str| Text::new(text).boxed(),
        || Text::new("loading").boxed(),
    );
    let settings = RenderSettings::new()
        .with_head(head)
        .with_timeout(Duration::from_millis(100));

    let start = Instant::now();
    let html = render(settings, body).await;
    assert!(html.contains("<title>slow</title>"));
    assert!(!html.contains("loading"));
    assert!(start.elapsed() < Duration::from_millis(90));
}

#[tokio::test(start_paused = true)]
async fn dropping_document_cancels_deferred_fragments() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let body = Defer::new(
        async move {
            sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok("done")
        },
        |text: &'static str| Text::new(text).boxed(),
        || Text::new("loading").boxed(),
    );

    let settings = RenderSettings::new().with_template("{{body}}{{deferredSlots}}");
    let mut stream = render_document(settings, body);
    let first = stream.next().await.unwrap().unwrap();
    assert!(first.as_str().contains("loading"));
    drop(stream);

    sleep(Duration::from_millis(100)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn streaming_sink_tracks_patches() {
    let (tx, rx) = mpsc::unbounded::<Vec<u8>>();
    let mut sink = StreamingSink::new(tx, TimingContext::new());

    sink.send_all(render_document(RenderSettings::new(), resolve_after(20)))
        .await
        .unwrap();

    assert_eq!(sink.phase(), &LifecyclePhase::Completion);
    assert!(sink.timing().time_to_shell().is_some());
    assert!(sink.timing().patch_timing("slot-0").is_some());

    drop(sink);
    let bytes: Vec<Vec<u8>> = rx.collect().await;
    let html = String::from_utf8(bytes.concat()).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains(r#"data-deferred-template="slot-0""#));
}

#[tokio::test(start_paused = true)]
async fn byte_stream_matches_text() {
    let config = StreamConfig::new().with_template("<body>{{body}}{{deferredSlots}}</body>");
    let bytes: Vec<Vec<u8>> = render_document_bytes(RenderSettings::from_config(&config), resolve_after(20))
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    let html = String::from_utf8(bytes.concat()).unwrap();
    assert!(html.starts_with(r#"<body><div style="display: contents" data-deferred-slot="slot-0">loading</div>"#));
    assert!(html.ends_with("</script></body>"));
}

#[tokio::test(start_paused = true)]
async fn deferred_values_keep_settling_while_body_renders() {
    let start = Instant::now();
    let settled_at = Arc::new(AtomicU64::new(0));
    let stamp = Arc::clone(&settled_at);

    let two_stage = Defer::new(
        async move {
            sleep(Duration::from_millis(15)).await;
            sleep(Duration::from_millis(10)).await;
            stamp.store(start.elapsed().as_millis() as u64, Ordering::SeqCst);
            Ok("first")
        },
        |text: &'static str| Text::new(text).boxed(),
        || Text::new("loading").boxed(),
    );
    let single = Defer::new(
        delayed(50, "second"),
        |text: &'static str| Text::new(text).boxed(),
        || Text::new("loading").boxed(),
    );
    let slow_sibling = Await::new(
        async {
            sleep(Duration::from_millis(100)).await;
            Ok(Text::new("done").boxed())
        }
        .boxed(),
    );
    let body = Fragment::new()
        .child(two_stage)
        .child(single)
        .child(slow_sibling);

    let mut stream = render_document(RenderSettings::new(), body);
    let mut patches = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        if let Some(slot) = chunk.slot() {
            patches.push((slot.to_string(), start.elapsed()));
        }
    }

    assert!(settled_at.load(Ordering::SeqCst) < 50);
    let order: Vec<&str> = patches.iter().map(|(slot, _)| slot.as_str()).collect();
    assert_eq!(order, ["slot-0", "slot-1"]);
    for (_, at) in &patches {
        assert!(*at < Duration::from_millis(105));
    }
}

struct Unavailable;

#[async_trait::async_trait]
impl Node for Unavailable {
    async fn render(&self, _env: &Environment) -> Result<String, RenderError> {
        Err(RenderError::failed("inventory service down"))
    }
}

#[tokio::test]
async fn render_failure_ends_document_with_error() {
    let body = Fragment::new().child(Text::new("before")).child(Unavailable);
    let mut stream = render_document(RenderSettings::new(), body);

    let mut html = String::new();
    let error = loop {
        match stream.next().await {
            Some(Ok(chunk)) => html.push_str(chunk.as_str()),
            Some(Err(error)) => break error,
            None => panic!("document ended without the render error"),
        }
    };

    assert!(matches!(error, RenderError::Failed(message) if message == "inventory service down"));
    assert!(html.ends_with(safari_pad()));
    assert!(!html.contains("before"));
    assert!(stream.next().await.is_none());
}
