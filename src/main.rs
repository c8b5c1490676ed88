use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use hostel::application::allocation::{AllocationWorkflow, Decision};
use hostel::application::laundry::LaundryService;
use hostel::application::notifications::NotificationCenter;
use hostel::application::payment::PaymentWorkflow;
use hostel::application::residence::Residence;
use hostel::application::study_rooms::StudyRooms;
use hostel::config::{MpesaConfig, PollConfig, SessionConfig, StoreConfig};
use hostel::domain::booking::{BookingQuery, BookingSort, BookingStatus, SortOrder};
use hostel::domain::laundry::LaundryOrder;
use hostel::domain::payment::{Amount, BillingMonth, Charge, PaymentRequest};
use hostel::domain::ports::{ClockRef, HostelStoreRef, PaymentGatewayRef};
use hostel::domain::session::Session;
use hostel::domain::study_room::{StudyRoomRequest, TimeSlot, parse_clock_time};
use hostel::domain::{BookingId, LaundryRequestId, NotificationId, StudyRoomId};
use hostel::error::HostelError;
use hostel::infrastructure::clock::SystemClock;
use hostel::infrastructure::mpesa::MpesaClient;
use hostel::infrastructure::postgrest::PostgrestStore;
use hostel::interfaces::csv::report_writer::ReportWriter;
use miette::Result;
use rust_decimal::Decimal;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Hostel bookings, allocations and M-Pesa payments", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreConfig,

    #[command(flatten)]
    session: SessionConfig,

    #[command(flatten)]
    mpesa: MpesaConfig,

    #[command(flatten)]
    poll: PollConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ListingArgs {
    /// Only show bookings in this status
    #[arg(long, value_enum)]
    status: Option<BookingStatus>,

    #[arg(long, value_enum, default_value = "request-date")]
    sort: BookingSort,

    #[arg(long)]
    ascending: bool,
}

impl ListingArgs {
    fn query(&self) -> BookingQuery {
        BookingQuery {
            status: self.status,
            sort: self.sort,
            order: if self.ascending {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            },
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List booking requests with their rooms (admin)
    Bookings(ListingArgs),
    /// Approve a booking request and allocate its room (admin)
    Approve {
        booking: BookingId,
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Reject a pending booking request (admin)
    Reject {
        booking: BookingId,
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Show your current room allocation or pending booking
    Room,
    /// Pay hostel charges through an M-Pesa STK push
    Pay {
        /// Phone number that receives the payment prompt
        #[arg(long)]
        phone: String,

        /// Charges to pay; their prices are summed
        #[arg(long = "charge", value_enum)]
        charges: Vec<Charge>,

        /// Pay an arbitrary amount instead of catalog charges
        #[arg(long, conflicts_with = "charges", requires = "description")]
        amount: Option<Decimal>,

        #[arg(long)]
        description: Option<String>,

        /// Billing month as YYYY-MM; defaults to the current month
        #[arg(long)]
        month: Option<BillingMonth>,
    },
    /// Show your payment history
    Payments,
    #[command(subcommand)]
    Laundry(LaundryCommand),
    #[command(subcommand)]
    Notifications(NotificationCommand),
    #[command(subcommand)]
    StudyRooms(StudyRoomCommand),
}

#[derive(Subcommand)]
enum LaundryCommand {
    /// Request a laundry pickup
    Submit {
        #[arg(long)]
        clothes: u32,

        /// Pickup time (RFC 3339)
        #[arg(long)]
        pickup: DateTime<Utc>,

        #[arg(long, default_value = "")]
        instructions: String,
    },
    /// List your laundry requests, or everyone's with --all (admin)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Move a request to its next status (admin)
    Advance { request: LaundryRequestId },
}

#[derive(Subcommand)]
enum NotificationCommand {
    List {
        #[arg(long)]
        unread: bool,
    },
    /// Mark one notification, or all with --all, as read
    Read {
        #[arg(required_unless_present = "all")]
        notification: Option<NotificationId>,

        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum StudyRoomCommand {
    /// List study rooms open for booking
    List,
    /// Request a study room for a time slot
    Book {
        room: StudyRoomId,

        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,

        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_clock_time)]
        start: NaiveTime,

        /// End time (HH:MM)
        #[arg(long, value_parser = parse_clock_time)]
        end: NaiveTime,
    },
    /// Show your study room bookings
    Mine,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let session = cli.session.session();

    let store: HostelStoreRef = Arc::new(
        PostgrestStore::new(&cli.store.url, cli.store.api_key.clone())
            .with_access_token(session.access_token.clone()),
    );
    let clock: ClockRef = Arc::new(SystemClock);
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());

    match cli.command {
        Command::Bookings(listing) => {
            let workflow = AllocationWorkflow::new(store, clock);
            let bookings = workflow.bookings(&session, &listing.query()).await?;
            writer.write_bookings(&bookings)?;
        }
        Command::Approve { booking, listing } => {
            let workflow = AllocationWorkflow::new(store, clock).with_listing(listing.query());
            let decision = workflow.approve(&session, booking).await?;
            report_decision(&mut writer, decision)?;
        }
        Command::Reject { booking, listing } => {
            let workflow = AllocationWorkflow::new(store, clock).with_listing(listing.query());
            let decision = workflow.reject(&session, booking).await?;
            report_decision(&mut writer, decision)?;
        }
        Command::Room => {
            let status = Residence::new(store).room_status(&session).await?;
            writer.write_room_status(&status)?;
        }
        Command::Pay {
            phone,
            charges,
            amount,
            description,
            month,
        } => {
            let request = match amount {
                Some(amount) => PaymentRequest::new(
                    Amount::new(amount)?,
                    phone,
                    description.unwrap_or_default(),
                ),
                None => Residence::new(store.clone()).quote(&session, &charges, &phone).await?,
            };
            let request = match month {
                Some(month) => request.for_month(month),
                None => request,
            };

            let gateway: PaymentGatewayRef = Arc::new(MpesaClient::new(
                &cli.mpesa.base_url,
                cli.mpesa.credentials(),
            ));
            let workflow = PaymentWorkflow::new(store, gateway, clock, cli.poll.policy());
            let outcome = workflow.pay(&session, request).await?;
            writer.write_outcome(&outcome)?;
            if let Some(failure) = outcome.resolution.failure() {
                return Err(failure.into());
            }
        }
        Command::Payments => {
            let payments = Residence::new(store).payment_history(&session).await?;
            writer.write_payments(&payments)?;
        }
        Command::Laundry(command) => {
            let service = LaundryService::new(store, clock);
            run_laundry(&service, &session, &mut writer, command).await?;
        }
        Command::Notifications(command) => {
            let center = NotificationCenter::new(store);
            match command {
                NotificationCommand::List { unread } => {
                    let mut notifications = center.list(&session).await?;
                    if unread {
                        notifications.retain(|n| !n.read);
                    }
                    writer.write_notifications(&notifications)?;
                }
                NotificationCommand::Read { all: true, .. } => {
                    let marked = center.mark_all_read(&session).await?;
                    eprintln!("marked {marked} notifications as read");
                }
                NotificationCommand::Read {
                    notification: Some(id),
                    ..
                } => center.mark_read(&session, id).await?,
                NotificationCommand::Read { .. } => {
                    return Err(miette::miette!("pass a notification id or --all"));
                }
            }
        }
        Command::StudyRooms(command) => {
            let rooms = StudyRooms::new(store, clock);
            match command {
                StudyRoomCommand::List => writer.write_study_rooms(&rooms.available().await?)?,
                StudyRoomCommand::Book {
                    room,
                    date,
                    start,
                    end,
                } => {
                    let request = StudyRoomRequest {
                        room_id: room,
                        date,
                        slot: TimeSlot::new(start, end)?,
                    };
                    rooms.request(&session, request).await?;
                    writer.write_study_bookings(&rooms.mine(&session).await?)?;
                }
                StudyRoomCommand::Mine => {
                    writer.write_study_bookings(&rooms.mine(&session).await?)?
                }
            }
        }
    }

    Ok(())
}

async fn run_laundry<W: io::Write>(
    service: &LaundryService,
    session: &Session,
    writer: &mut ReportWriter<W>,
    command: LaundryCommand,
) -> std::result::Result<(), HostelError> {
    match command {
        LaundryCommand::Submit {
            clothes,
            pickup,
            instructions,
        } => {
            let request = service
                .submit(
                    session,
                    LaundryOrder {
                        number_of_clothes: clothes,
                        special_instructions: instructions,
                        pickup_time: pickup,
                    },
                )
                .await?;
            writer.write_laundry(&[request])
        }
        LaundryCommand::List { all } => {
            let requests = match all {
                true => service.all(session).await?,
                false => service.mine(session).await?,
            };
            writer.write_laundry(&requests)
        }
        LaundryCommand::Advance { request } => {
            let request = service.advance(session, request).await?;
            writer.write_laundry(&[request])
        }
    }
}

/// Prints the refreshed booking list, then surfaces the decision's error.
fn report_decision<W: io::Write>(
    writer: &mut ReportWriter<W>,
    decision: Decision,
) -> std::result::Result<(), HostelError> {
    writer.write_bookings(&decision.bookings)?;
    decision.outcome.map(|_| ())
}
