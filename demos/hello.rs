//! Hello World server
//!
//! Reads `config.json` (and `.env`) from the working directory if present,
//! then serves a couple of routes.
//!
//! Run with: `cargo run --example hello`
//! Try:      `curl http://localhost:3000/hello/ada`
//!           `curl -X POST -d '{"name":"ada"}' http://localhost:3000/greetings`

use serde::Deserialize;
use shallot::prelude::*;
use shallot::{JsonRenderer, LogConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Visits(AtomicU64);

impl Visits {
    fn hit(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Deserialize)]
struct Greeting {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = AppConfig::load_default()?;
    let _guard = LogConfig::from_app_config(&config).init()?;

    let mut app = Application::with_config(config);
    app.bind(Visits::default());
    app.bind_as::<dyn Renderer>(Arc::new(JsonRenderer { pretty: true }));

    app.use_handler(
        |ctx: &mut Context<'_>, visits: Inject<Visits>| -> Result<(), Error> {
            visits.hit();
            ctx.next()
        },
    );

    app.get("/", || "Welcome to Shallot!")?;
    app.get("/hello/:name", |ctx: &mut Context<'_>| {
        format!("Hello, {}!", ctx.param("name").unwrap_or("stranger"))
    })?;
    app.post("/greetings", |Json(greeting): Json<Greeting>| -> Result<Render, Error> {
        Render::new("greeting")
            .status(StatusCode::CREATED)
            .data(&serde_json::json!({ "greeting": format!("Hello, {}!", greeting.name) }))
    })?;
    app.get("/visits", |visits: Inject<Visits>| {
        visits.count().to_string()
    })?;

    app.listen().await
}
