use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use loanagent::config::{AppConfig, LoanSettings, ScreeningSettings};
use loanagent::error::AppError;
use loanagent::telemetry;
use loanagent::workflows::loan::{
    loan_router, ApplicantId, CsvUserDirectory, InMemorySessionStore, InMemoryUserDirectory,
    LoanConversationService, LoanPolicy, LoanType, ScreeningPolicy, ScriptedResponder,
    UserDirectory,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Loan Conversation Agent",
    about = "Run the conversational loan-processing service or a scripted demo",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk one applicant through the full conversation on the console
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Applicant id from the bundled sample directory
    #[arg(long, default_value = "USR001")]
    user_id: String,
    /// Loan type to request (personal, home, auto, business)
    #[arg(long, default_value = "personal", value_parser = parse_loan_type)]
    loan_type: LoanType,
    /// Loan amount to request
    #[arg(long, default_value_t = 250_000.0)]
    amount: f64,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

fn parse_loan_type(raw: &str) -> Result<LoanType, String> {
    LoanType::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not one of: personal, home, auto, business"))
}

fn loan_policy_from(settings: &LoanSettings) -> LoanPolicy {
    LoanPolicy {
        loan_multiplier: settings.multiplier,
        loan_term_years: settings.term_years,
        max_loan_amount: settings.max_loan_amount,
    }
}

fn screening_policy_from(settings: &ScreeningSettings) -> ScreeningPolicy {
    let mut policy = ScreeningPolicy {
        cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
        simulation_match_probability: settings.simulation_match_probability,
        ..ScreeningPolicy::default()
    };
    policy
        .denylist
        .extend(settings.extra_denylist.iter().cloned());
    policy
}

fn build_loan_routes<D>(directory: D, config: &AppConfig) -> Router
where
    D: UserDirectory + 'static,
{
    let service = LoanConversationService::new(
        Arc::new(directory),
        Arc::new(InMemorySessionStore::default()),
        Arc::new(ScriptedResponder),
        loan_policy_from(&config.loan),
        screening_policy_from(&config.screening),
    );
    loan_router(Arc::new(service))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let loan_routes = match (
        config.directory.users_file.clone(),
        config.directory.loans_file.clone(),
    ) {
        (Some(users), Some(loans)) => {
            build_loan_routes(CsvUserDirectory::new(users, loans), &config)
        }
        _ => build_loan_routes(InMemoryUserDirectory::with_sample_records(), &config),
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(loan_routes)
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan conversation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let directory = Arc::new(InMemoryUserDirectory::with_sample_records());
    let sessions = Arc::new(InMemorySessionStore::default());
    let responder = Arc::new(ScriptedResponder);
    let service = LoanConversationService::new(
        directory,
        sessions,
        responder,
        LoanPolicy::default(),
        ScreeningPolicy {
            // The demo should run end to end, so the random-hit simulation
            // is disabled; the static denylist still applies.
            simulation_match_probability: 0.0,
            ..ScreeningPolicy::default()
        },
    );

    let applicant = ApplicantId(args.user_id.clone());

    let greeting = service.greet(&applicant)?;
    println!("agent: {}", greeting.message);

    let screened = service.select_loan_type(&applicant, args.loan_type)?;
    println!("agent: {}", screened.message);
    if !screened.screening_clear {
        println!("(conversation halted: {})", screened.screening_status);
        return Ok(());
    }
    println!(
        "  on file: income {:.2}/mo, expenses {:.2}/mo, existing loan {:.2}",
        screened.monthly_income, screened.monthly_expenses, screened.existing_loan
    );

    let confirmation = service.confirm_data(&applicant)?;
    println!("agent: {}", confirmation.message);

    let prompt = service.request_loan_amount(&applicant)?;
    println!("agent: {}", prompt.message);

    let verdict = service.calculate_eligibility(&applicant, args.amount)?;
    println!(
        "agent: {} (requested {:.2}, eligible up to {:.2})",
        verdict.message, verdict.requested_amount, verdict.eligible_amount
    );

    let closing = service.final_confirmation(&applicant)?;
    println!("agent: {}", closing.message);

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
