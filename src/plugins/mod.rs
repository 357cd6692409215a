pub mod cron;
pub mod server;

use std::sync::Arc;

use futures::future::join_all;

use crate::state::AppState;

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  /// Long-running plugins never return; returning `Ok` means the plugin
  /// has nothing to do (e.g. disabled by config).
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct App {
  plugins: Vec<Box<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Box::new(plugin));
    self
  }

  /// Runs every plugin concurrently until all of them stop.
  pub async fn run(self, app: Arc<AppState>) {
    let runs = self.plugins.iter().map(|plugin| {
      let app = app.clone();
      let name = plugin.name();
      async move {
        tracing::info!("init `{name}`");
        match plugin.start(app).await {
          Ok(()) => tracing::info!("stopped `{name}`"),
          Err(err) => tracing::error!("failed `{name}`: {err:#}"),
        }
      }
    });
    join_all(runs).await;
  }
}
