#[tokio::main]
async fn main() {
  if let Err(e) = fitness_planner_lib::run().await {
    tracing::error!(error = %e, "Fitness planner stopped");
    std::process::exit(1);
  }
}
