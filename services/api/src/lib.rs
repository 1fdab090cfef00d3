mod cli;
mod infra;
mod routes;
mod server;

use trade_access::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
