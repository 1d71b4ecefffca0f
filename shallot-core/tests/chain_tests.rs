use bytes::Bytes;
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde::Deserialize;
use shallot_core::{
    BoxedHandler, Chain, ChainState, Container, Context, Error, Inject, Json, JsonRenderer, Params,
    Recorder, Render, Renderer, Req, ResponseWriter, handler,
};
use std::sync::Arc;

/// Markers pushed by the handlers below, in execution order.
#[derive(Clone, Default)]
struct MarkerLog(Arc<Mutex<Vec<String>>>);

impl MarkerLog {
    fn push(&self, marker: impl Into<String>) {
        self.0.lock().push(marker.into());
    }

    fn markers(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

fn marker(trail: &MarkerLog, name: String) -> BoxedHandler {
    let trail = trail.clone();
    handler(move |ctx: &mut Context<'_>| -> Result<(), Error> {
        trail.push(format!("before_{name}"));
        ctx.next()?;
        trail.push(format!("after_{name}"));
        Ok(())
    })
}

fn stopper(trail: &MarkerLog, name: String) -> BoxedHandler {
    let trail = trail.clone();
    handler(move |_ctx: &mut Context<'_>| trail.push(format!("before_{name}")))
}

fn action(trail: &MarkerLog) -> BoxedHandler {
    let trail = trail.clone();
    handler(move || trail.push("action"))
}

struct Outcome {
    result: Result<(), Error>,
    state: ChainState,
    recorder: Recorder,
}

fn run(app: &Container<'static>, chain: Chain) -> Outcome {
    run_request(app, chain, http::Request::new(Bytes::new()), Params::new())
}

fn run_request(
    app: &Container<'static>,
    chain: Chain,
    request: http::Request<Bytes>,
    params: Params,
) -> Outcome {
    let recorder = Recorder::new();
    let mut ctx = Context::new(
        app,
        chain,
        request,
        ResponseWriter::new(recorder.clone()),
        params,
    );
    let result = ctx.run();
    Outcome {
        result,
        state: ctx.state(),
        recorder,
    }
}

#[test]
fn test_onion_order() {
    let app = Container::new();
    let trail = MarkerLog::default();
    let n = 5;
    let chain = Chain::new(
        (1..=n).map(|i| marker(&trail, i.to_string())),
        action(&trail),
    );

    let outcome = run(&app, chain);

    let mut expected: Vec<String> = (1..=n).map(|i| format!("before_{i}")).collect();
    expected.push("action".into());
    expected.extend((1..=n).rev().map(|i| format!("after_{i}")));

    assert!(outcome.result.is_ok());
    assert_eq!(trail.markers(), expected);
    assert_eq!(outcome.state, ChainState::Completed);
}

#[test]
fn test_handler_without_next_truncates() {
    let app = Container::new();
    let trail = MarkerLog::default();
    let k = 3;
    let mut handlers: Vec<BoxedHandler> = (1..k).map(|i| marker(&trail, i.to_string())).collect();
    handlers.push(stopper(&trail, k.to_string()));
    handlers.extend((k + 1..=5).map(|i| marker(&trail, i.to_string())));

    let outcome = run(&app, Chain::new(handlers, action(&trail)));

    assert_eq!(
        trail.markers(),
        ["before_1", "before_2", "before_3", "after_2", "after_1"]
    );
    assert_eq!(outcome.state, ChainState::EarlyExit);
}

#[test]
fn test_next_past_end_is_noop() {
    let app = Container::new();
    let trail = MarkerLog::default();
    let last = {
        let trail = trail.clone();
        handler(move |ctx: &mut Context<'_>| -> Result<(), Error> {
            trail.push("last");
            ctx.next()?;
            ctx.next()?;
            trail.push("still here");
            Ok(())
        })
    };

    let outcome = run(&app, Chain::new(Vec::new(), last));

    assert!(outcome.result.is_ok());
    assert_eq!(trail.markers(), ["last", "still here"]);
    assert_eq!(outcome.state, ChainState::Completed);
}

#[test]
fn test_context_runs_once() {
    let app = Container::new();
    let recorder = Recorder::new();
    let mut ctx = Context::new(
        &app,
        Chain::new(Vec::new(), handler(|| ())),
        http::Request::new(Bytes::new()),
        ResponseWriter::new(recorder),
        Params::new(),
    );

    assert_eq!(ctx.state(), ChainState::Pending);
    ctx.run().unwrap();
    assert!(matches!(ctx.run(), Err(Error::Internal(_))));
}

#[test]
fn test_early_write_with_status() {
    let app = Container::new();
    let trail = MarkerLog::default();
    let writer = handler(|ctx: &mut Context<'_>| -> Result<(), Error> {
        ctx.response().write(b"foo")?;
        ctx.next()?;
        ctx.response().write(b"ban")?;
        Ok(())
    });
    let act = handler(|| (StatusCode::BAD_REQUEST, "bat"));

    let outcome = run(&app, Chain::new(vec![writer, marker(&trail, "x".into())], act));

    assert_eq!(outcome.recorder.body_string(), "foobatban");
    // "foo" committed 200 before the action asked for 400
    assert_eq!(outcome.recorder.status(), StatusCode::OK);
}

#[test]
fn test_inject_resolves_application_bindings() {
    let mut app = Container::new();
    app.bind(String::from("from app"));
    app.bind(41u64);

    let act = handler(|text: Inject<String>, number: Inject<u64>| {
        format!("{} {}", *text, *number + 1)
    });
    let outcome = run(&app, Chain::new(Vec::new(), act));

    assert_eq!(outcome.recorder.body_string(), "from app 42");
}

#[test]
fn test_request_binding_shadows_downstream_only() {
    let mut app = Container::new();
    app.bind(String::from("app"));

    let shadow = handler(|ctx: &mut Context<'_>| -> Result<(), Error> {
        ctx.bind(String::from("request"));
        ctx.next()
    });
    let act = handler(|value: Inject<String>| (*value).clone());

    let outcome = run(&app, Chain::new(vec![shadow], act));

    assert_eq!(outcome.recorder.body_string(), "request");
    assert_eq!(*app.resolve::<String>().unwrap(), "app");
}

#[test]
fn test_missing_dependency_is_attributed() {
    struct Missing;

    let app = Container::new();
    let trail = MarkerLog::default();
    let needy = handler(|_m: Inject<Missing>| "unreachable").with_name("needy");

    let outcome = run(&app, Chain::new(vec![marker(&trail, "1".into())], needy));

    match outcome.result {
        Err(Error::DependencyUnsatisfied { dependency, handler }) => {
            assert!(dependency.ends_with("Missing"));
            assert_eq!(handler, Some("needy"));
        }
        other => panic!("expected DependencyUnsatisfied, got {other:?}"),
    }
    assert_eq!(outcome.state, ChainState::Faulted);
    assert!(!outcome.recorder.committed());
    // upstream saw the error through next() and did not continue
    assert_eq!(trail.markers(), ["before_1"]);
}

#[test]
fn test_optional_dependency() {
    struct Missing;

    let app = Container::new();
    let act = handler(|m: Option<Inject<Missing>>| match m {
        Some(_) => "present",
        None => "absent",
    });

    let outcome = run(&app, Chain::new(Vec::new(), act));
    assert_eq!(outcome.recorder.body_string(), "absent");
}

#[test]
fn test_panic_becomes_error_upstream() {
    let app = Container::new();
    let seen = MarkerLog::default();
    let guard = {
        let seen = seen.clone();
        handler(move |ctx: &mut Context<'_>| -> Result<(), Error> {
            match ctx.next() {
                Err(Error::HandlerPanic { message, .. }) => {
                    seen.push(message);
                    ctx.response().write_header(StatusCode::SERVICE_UNAVAILABLE)?;
                    Ok(())
                }
                other => other,
            }
        })
    };
    let boom = handler(|| -> &'static str { panic!("boom") });

    let outcome = run(&app, Chain::new(vec![guard], boom));

    assert!(outcome.result.is_ok());
    assert_eq!(seen.markers(), ["boom"]);
    assert_eq!(outcome.recorder.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn test_handler_errors_reach_upstream() {
    let app = Container::new();
    let trail = MarkerLog::default();
    let act = handler(|| -> Result<(), Error> { Err(Error::Unauthorized("no token".into())) });

    let outcome = run(&app, Chain::new(vec![marker(&trail, "1".into())], act));

    assert!(matches!(outcome.result, Err(Error::Unauthorized(_))));
    assert_eq!(trail.markers(), ["before_1"]);
}

#[test]
fn test_request_extractors() {
    #[derive(Deserialize)]
    struct Signup {
        name: String,
    }

    let app = Container::new();
    let act = handler(|req: Req, params: Params, Json(body): Json<Signup>| {
        format!(
            "{} {} {} {}",
            req.method(),
            req.uri().path(),
            params.get("team").unwrap_or("-"),
            body.name
        )
    });
    let request = http::Request::builder()
        .method(Method::POST)
        .uri("/teams/red/members")
        .body(Bytes::from_static(br#"{"name":"ada"}"#))
        .unwrap();
    let params: Params = [("team", "red")].into_iter().collect();

    let outcome = run_request(&app, Chain::new(Vec::new(), act), request, params);

    assert_eq!(outcome.recorder.body_string(), "POST /teams/red/members red ada");
}

#[test]
fn test_bad_json_is_bad_request() {
    #[derive(Deserialize)]
    struct Payload {
        _id: u32,
    }

    let app = Container::new();
    let act = handler(|_body: Json<Payload>| ());
    let request = http::Request::new(Bytes::from_static(b"{"));

    let outcome = run_request(&app, Chain::new(Vec::new(), act), request, Params::new());
    assert!(matches!(outcome.result, Err(Error::BadRequest(_))));
}

#[test]
fn test_side_bag_between_handlers() {
    let app = Container::new();
    let stash = handler(|ctx: &mut Context<'_>| -> Result<(), Error> {
        ctx.set_data("user", String::from("ada"));
        ctx.set_data("visits", 1u32);
        ctx.next()?;
        assert_eq!(ctx.remove_data::<u32>("visits"), Some(2));
        Ok(())
    });
    let act = handler(|ctx: &mut Context<'_>| -> Result<String, Error> {
        if let Some(visits) = ctx.data_mut::<u32>("visits") {
            *visits += 1;
        }
        assert!(ctx.data::<u32>("user").is_none());
        Ok(ctx.data::<String>("user").cloned().unwrap_or_default())
    });

    let outcome = run(&app, Chain::new(vec![stash], act));

    assert!(outcome.result.is_ok());
    assert_eq!(outcome.recorder.body_string(), "ada");
}

#[test]
fn test_render_uses_bound_renderer() {
    let mut app = Container::new();
    app.bind_as::<dyn Renderer>(Arc::new(JsonRenderer::default()));

    let act = handler(|| -> Result<Render, Error> {
        Render::new("user/show").data(&serde_json::json!({"id": 7}))
    });
    let outcome = run(&app, Chain::new(Vec::new(), act));

    assert!(outcome.result.is_ok());
    assert_eq!(outcome.recorder.body_string(), r#"{"id":7}"#);
    assert_eq!(
        outcome.recorder.header("content-type").as_deref(),
        Some("application/json; charset=utf-8")
    );
}

#[test]
fn test_render_without_renderer_is_unsatisfied() {
    let app = Container::new();
    let act = handler(|| Render::new("index")).with_name("index");

    let outcome = run(&app, Chain::new(Vec::new(), act));

    match outcome.result {
        Err(Error::DependencyUnsatisfied { dependency, handler }) => {
            assert!(dependency.contains("Renderer"));
            assert_eq!(handler, Some("index"));
        }
        other => panic!("expected DependencyUnsatisfied, got {other:?}"),
    }
}

#[test]
fn test_plain_handler_continues_unless_it_writes() {
    let app = Container::new();
    let trail = MarkerLog::default();
    let quiet = {
        let trail = trail.clone();
        handler(move || trail.push("quiet"))
    };
    let loud = {
        let trail = trail.clone();
        handler(move || {
            trail.push("loud");
            "written"
        })
    };

    let outcome = run(
        &app,
        Chain::new(vec![marker(&trail, "1".into()), quiet, loud], action(&trail)),
    );

    assert_eq!(trail.markers(), ["before_1", "quiet", "loud", "after_1"]);
    assert_eq!(outcome.recorder.body_string(), "written");
    assert_eq!(outcome.state, ChainState::EarlyExit);
}
