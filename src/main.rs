use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use velo::config::{ClientConfig, ConfigError};
use velo::guard::{self, Access};
use velo::net::api::{ApiClient, ApiError};
use velo::net::types::{Credentials, Role, Vehicle};
use velo::services::passenger::PassengerDashboard;
use velo::services::rides::RideDraft;
use velo::services::users::Registration;
use velo::services::{ServiceError, driver, rides, users, vehicles};
use velo::state::auth::{AuthError, AuthStore};
use velo::state::session::SessionPatch;
use velo::state::storage::FileStore;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl CliError {
    fn is_session_expired(&self) -> bool {
        matches!(self, Self::Service(e) if e.is_session_expired())
    }
}

#[derive(Parser, Debug)]
#[command(name = "velo", about = "Velo ride-sharing client")]
struct Cli {
    /// Backend base URL (overrides VELO_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding the persisted session (overrides VELO_STATE_DIR).
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session.
    Login {
        login: String,
        #[arg(long, env = "VELO_PASSWORD", hide_env_values = true)]
        password: String,
        /// Role to assume if the server does not report one.
        #[arg(long)]
        role: Option<Role>,
    },
    Logout,
    /// Show the current session.
    Whoami,
    Register(RegisterArgs),
    /// Update the logged-in user's profile.
    Profile(ProfileArgs),
    Vehicle(VehicleCommand),
    Ride(RideCommand),
    Driver(DriverCommand),
    Passenger(PassengerCommand),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    login: String,
    #[arg(long, env = "VELO_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    confirm_password: String,
    #[arg(long, default_value = "")]
    photo: String,
    #[arg(long)]
    sex: Option<String>,
    #[arg(long, help = "Birth date, YYYY-MM-DD")]
    date: Option<String>,
    #[arg(long, default_value = "passageiro")]
    role: Role,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    photo: Option<String>,
    #[arg(long)]
    sex: Option<String>,
    #[arg(long)]
    date: Option<String>,
}

#[derive(Args, Debug)]
struct VehicleCommand {
    #[command(subcommand)]
    command: VehicleSubcommand,
}

#[derive(Subcommand, Debug)]
enum VehicleSubcommand {
    List,
    Read {
        vehicle_id: i64,
    },
    Create(VehicleArgs),
    Update {
        vehicle_id: i64,
        #[command(flatten)]
        vehicle: VehicleArgs,
    },
    Delete {
        vehicle_id: i64,
    },
}

#[derive(Args, Debug)]
struct VehicleArgs {
    #[arg(long)]
    manufacturer: String,
    #[arg(long)]
    model: String,
    #[arg(long)]
    year: i32,
    #[arg(long)]
    color: String,
    #[arg(long)]
    plate: String,
}

impl VehicleArgs {
    fn into_vehicle(self, id: i64) -> Vehicle {
        Vehicle {
            id,
            manufacturer: self.manufacturer,
            model: self.model,
            year: self.year,
            color: self.color,
            plate: self.plate,
        }
    }
}

#[derive(Args, Debug)]
struct RideCommand {
    #[command(subcommand)]
    command: RideSubcommand,
}

#[derive(Subcommand, Debug)]
enum RideSubcommand {
    List,
    Read {
        ride_id: i64,
    },
    Create(RideArgs),
    Update {
        ride_id: i64,
        #[command(flatten)]
        ride: RideArgs,
    },
    Delete {
        ride_id: i64,
    },
}

#[derive(Args, Debug)]
struct RideArgs {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    price: f64,
    #[arg(long)]
    origin: String,
    #[arg(long)]
    destination: String,
    #[arg(long)]
    distance_km: f64,
    #[arg(long)]
    speed_kmh: f64,
    #[arg(long, help = "Departure, RFC 3339 or YYYY-MM-DD[THH:MM]")]
    date: String,
    #[arg(long)]
    vehicle_id: i64,
    #[arg(long, default_value_t = false)]
    same_gender_driver: bool,
    #[arg(long, default_value_t = false)]
    inactive: bool,
}

impl RideArgs {
    fn into_draft(self, id: i64) -> RideDraft {
        RideDraft {
            id,
            title: self.title,
            description: self.description,
            price: self.price,
            origin: self.origin,
            destination: self.destination,
            distance_km: self.distance_km,
            average_speed_kmh: self.speed_kmh,
            active: !self.inactive,
            date: self.date,
            same_gender_driver: self.same_gender_driver,
            vehicle_id: self.vehicle_id,
        }
    }
}

#[derive(Args, Debug)]
struct DriverCommand {
    #[command(subcommand)]
    command: DriverSubcommand,
}

#[derive(Subcommand, Debug)]
enum DriverSubcommand {
    /// Today's summary and the next trip.
    Dashboard,
    Online,
    Offline,
    Start {
        trip_id: i64,
    },
    Cancel {
        trip_id: i64,
    },
}

#[derive(Args, Debug)]
struct PassengerCommand {
    #[command(subcommand)]
    command: PassengerSubcommand,
}

#[derive(Subcommand, Debug)]
enum PassengerSubcommand {
    /// Recent destinations and the pending request.
    Show,
    Request {
        destination: String,
    },
    Cancel,
}

impl Command {
    fn access(&self) -> Access {
        match self {
            Self::Login { .. } | Self::Logout | Self::Whoami | Self::Register(_) => Access::Public,
            Self::Driver(_) => Access::DriverOnly,
            Self::Profile(_) | Self::Vehicle(_) | Self::Ride(_) | Self::Passenger(_) => Access::Authenticated,
        }
    }
}

struct CliContext {
    api: ApiClient,
    store: AuthStore,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if let CliError::Service(service) = &e {
                if let Some(route) = guard::redirect_for(service) {
                    eprintln!("(redirect: {route})");
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url)?;
    }
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }

    let api = ApiClient::new(&config.api_url, config.timeouts)?;
    let storage = Arc::new(FileStore::new(config.state_dir.clone()));
    let store = AuthStore::new(Arc::new(api.clone()), storage);
    let restored = store.initialize().await;
    tracing::debug!(api_url = %config.api_url, state_dir = %config.state_dir.display(), restored, "client ready");

    let ctx = CliContext { api, store };
    let result = dispatch(&ctx, cli.command).await;
    if result.as_ref().is_err_and(CliError::is_session_expired) {
        tracing::warn!("session expired; logging out");
        ctx.store.logout().await;
    }
    ctx.store.settle().await;
    result
}

async fn dispatch(ctx: &CliContext, command: Command) -> Result<(), CliError> {
    guard::check(command.access(), &ctx.store.session().await)?;

    match command {
        Command::Login { login, password, role } => {
            let credentials = Credentials::new(login, password).with_role(role.unwrap_or_default());
            let session = ctx.store.login(&credentials).await?;
            println!("logged in as {} ({})", session.name(), display_role(session.role()));
            Ok(())
        }
        Command::Logout => {
            ctx.store.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => run_whoami(ctx).await,
        Command::Register(args) => run_register(ctx, args).await,
        Command::Profile(args) => run_profile(ctx, args).await,
        Command::Vehicle(vehicle) => run_vehicle(ctx, vehicle).await,
        Command::Ride(ride) => run_ride(ctx, ride).await,
        Command::Driver(driver) => run_driver(ctx, driver).await,
        Command::Passenger(passenger) => run_passenger(ctx, passenger).await,
    }
}

fn display_role(role: Role) -> &'static str {
    if role.is_unset() { "role pending" } else { role.as_str() }
}

async fn run_whoami(ctx: &CliContext) -> Result<(), CliError> {
    let session = ctx.store.session().await;
    if !session.is_authenticated() {
        println!("not logged in");
        return Ok(());
    }
    print_json(&session.snapshot())
}

async fn run_register(ctx: &CliContext, args: RegisterArgs) -> Result<(), CliError> {
    let registration = Registration {
        name: args.name,
        login: args.login,
        password: args.password,
        password_confirmation: args.confirm_password,
        photo: args.photo,
        sex: args.sex,
        date: args.date,
        role: args.role,
    };
    let created = users::register(&ctx.api, registration).await?;
    println!("registered user {} ({}); log in to continue", created.id, created.login);
    Ok(())
}

async fn run_profile(ctx: &CliContext, args: ProfileArgs) -> Result<(), CliError> {
    let patch = SessionPatch { name: args.name, photo: args.photo, sex: args.sex, date: args.date, ..SessionPatch::default() };
    if patch.is_empty() {
        return Err(ServiceError::Validation("nothing to update".to_owned()).into());
    }
    let session = users::update_profile(&ctx.api, &ctx.store, &patch).await?;
    print_json(&session.snapshot())
}

async fn run_vehicle(ctx: &CliContext, vehicle: VehicleCommand) -> Result<(), CliError> {
    match vehicle.command {
        VehicleSubcommand::List => print_json(&vehicles::list(&ctx.api, &ctx.store).await?),
        VehicleSubcommand::Read { vehicle_id } => print_json(&vehicles::get(&ctx.api, &ctx.store, vehicle_id).await?),
        VehicleSubcommand::Create(args) => {
            print_json(&vehicles::save(&ctx.api, &ctx.store, &args.into_vehicle(0)).await?)
        }
        VehicleSubcommand::Update { vehicle_id, vehicle } => {
            print_json(&vehicles::save(&ctx.api, &ctx.store, &vehicle.into_vehicle(vehicle_id)).await?)
        }
        VehicleSubcommand::Delete { vehicle_id } => {
            vehicles::delete(&ctx.api, &ctx.store, vehicle_id).await?;
            println!("deleted vehicle {vehicle_id}");
            Ok(())
        }
    }
}

async fn run_ride(ctx: &CliContext, ride: RideCommand) -> Result<(), CliError> {
    match ride.command {
        RideSubcommand::List => print_json(&rides::list(&ctx.api, &ctx.store).await?),
        RideSubcommand::Read { ride_id } => print_json(&rides::get(&ctx.api, &ctx.store, ride_id).await?),
        RideSubcommand::Create(args) => print_json(&rides::save(&ctx.api, &ctx.store, &args.into_draft(0)).await?),
        RideSubcommand::Update { ride_id, ride } => {
            print_json(&rides::save(&ctx.api, &ctx.store, &ride.into_draft(ride_id)).await?)
        }
        RideSubcommand::Delete { ride_id } => {
            rides::delete(&ctx.api, &ctx.store, ride_id).await?;
            println!("deleted ride {ride_id}");
            Ok(())
        }
    }
}

async fn run_driver(ctx: &CliContext, command: DriverCommand) -> Result<(), CliError> {
    match command.command {
        DriverSubcommand::Dashboard => print_json(&driver::overview(&ctx.api, &ctx.store).await?),
        DriverSubcommand::Online => {
            driver::set_online(&ctx.api, &ctx.store, true).await?;
            println!("online");
            Ok(())
        }
        DriverSubcommand::Offline => {
            driver::set_online(&ctx.api, &ctx.store, false).await?;
            println!("offline");
            Ok(())
        }
        DriverSubcommand::Start { trip_id } => {
            driver::start_trip(&ctx.api, &ctx.store, trip_id).await?;
            println!("trip {trip_id} started");
            Ok(())
        }
        DriverSubcommand::Cancel { trip_id } => {
            driver::cancel_trip(&ctx.api, &ctx.store, trip_id).await?;
            println!("trip {trip_id} cancelled");
            Ok(())
        }
    }
}

async fn run_passenger(ctx: &CliContext, command: PassengerCommand) -> Result<(), CliError> {
    let user_id = ctx.store.session().await.id();
    let storage = ctx.store.storage();
    let mut dashboard = PassengerDashboard::load(storage.as_ref(), user_id);
    match command.command {
        PassengerSubcommand::Show => {}
        PassengerSubcommand::Request { destination } => {
            dashboard.request_ride(&destination)?;
            dashboard.save(storage.as_ref(), user_id)?;
        }
        PassengerSubcommand::Cancel => {
            if !dashboard.cancel() {
                println!("no pending ride");
                return Ok(());
            }
            dashboard.save(storage.as_ref(), user_id)?;
        }
    }
    print_json(&dashboard)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
