mod app;
mod applications;
mod catalog;
mod config;
mod error;
mod identity;
mod models;
mod reviews;
mod store;

use anyhow::{anyhow, Result};
use app::App;
use applications::ApplicationForm;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::Config;
use error::AdmitError;
use identity::{resolve_oauth, ProfileUpdate};
use models::{ApplicationStatus, ReviewRecord};
use reviews::{average_rating, RatingSummary, RECENT_REVIEW_LIMIT};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "admit")]
#[command(about = "Browse colleges, track admission applications, and share reviews")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the local data store
    Init,

    /// List colleges
    Colleges {
        /// Filter by name, location, or type
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show college details and reviews
    College {
        /// College ID
        id: u32,
    },

    /// Sign in with email/password or an OAuth provider
    Login {
        #[arg(short, long)]
        email: Option<String>,

        #[arg(short, long)]
        password: Option<String>,

        /// OAuth provider (google, github)
        #[arg(long, conflicts_with_all = ["email", "password"])]
        provider: Option<String>,
    },

    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show or edit your profile
    Profile {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        university: Option<String>,

        #[arg(long)]
        address: Option<String>,

        /// Profile image reference
        #[arg(long)]
        image: Option<String>,
    },

    /// Apply to a college
    Apply {
        /// College ID
        college_id: u32,

        /// Program to apply for (must be offered by the college)
        #[arg(short, long)]
        subject: String,

        #[arg(long)]
        phone: String,

        #[arg(long)]
        address: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: NaiveDate,

        /// Candidate name (defaults to your profile name)
        #[arg(long)]
        name: Option<String>,

        /// Candidate email (defaults to your profile email)
        #[arg(long)]
        email: Option<String>,

        /// Profile image reference
        #[arg(long)]
        image: Option<String>,
    },

    /// List your applications
    Applications,

    /// Set an application's status (submitted, under-review, accepted, rejected)
    Status {
        /// Application ID
        id: i64,

        status: ApplicationStatus,
    },

    /// Review a college
    Review {
        /// College name
        #[arg(required_unless_present = "application")]
        college: Option<String>,

        /// Review the college of an accepted application instead
        #[arg(short, long, conflicts_with = "college")]
        application: Option<i64>,

        /// Rating from 1 to 5
        #[arg(short, long)]
        rating: Option<i64>,

        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Show reviews for a college, or the latest reviews everywhere
    Reviews {
        /// College name
        #[arg(required_unless_present = "recent")]
        college: Option<String>,

        /// Show the most recent reviews across all colleges
        #[arg(long, conflicts_with = "college")]
        recent: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Err(e) => match e.downcast_ref::<AdmitError>() {
            Some(admit) if admit.is_validation() => {
                eprintln!("Invalid input: {}", admit);
                std::process::exit(2);
            }
            _ => Err(e),
        },
        ok => ok,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let app = App::open(&config).await?;

    match cli.command {
        Commands::Init => {
            println!("Store initialized at {}", config.data_path.display());
        }

        Commands::Colleges { search } => {
            let colleges = catalog::search(search.as_deref().unwrap_or(""));
            if colleges.is_empty() {
                println!("No colleges found.");
            } else {
                println!("{:<4} {:<36} {:<16} {:<8} {:>6} {:<14}", "ID", "NAME", "LOCATION", "TYPE", "RATING", "ADMISSION");
                println!("{}", "-".repeat(89));
                for college in colleges {
                    println!(
                        "{:<4} {:<36} {:<16} {:<8} {:>6.1} {:<14}",
                        college.id,
                        truncate(college.name, 34),
                        truncate(college.location, 14),
                        college.kind.as_str(),
                        college.rating,
                        college.admission_date
                    );
                }
            }
        }

        Commands::College { id } => {
            let college = catalog::find(id).ok_or_else(|| anyhow!("College #{} not found", id))?;
            println!("{} (#{})", college.name, college.id);
            println!("{} · {} · {} students", college.location, college.kind.as_str(), college.students);
            println!("Rating: {:.1} · {} research papers", college.rating, college.research_count);
            println!("Admission opens: {}", college.admission_date);
            println!("\n{}", textwrap::fill(college.description, 76));
            if !college.admission_process.is_empty() {
                println!("\nAdmission process:\n{}", textwrap::fill(college.admission_process, 76));
            }
            if college.accepts_applications() {
                println!("\nPrograms: {}", college.programs.join(", "));
            } else {
                println!("\nNot accepting applications.");
            }
            if !college.events.is_empty() {
                println!("\nEvents:");
                for event in college.events {
                    println!("  {} ({}) - {}", event.name, event.date, event.description);
                }
            }
            if !college.research_works.is_empty() {
                println!("\nResearch:");
                for work in college.research_works {
                    println!("  {}", work);
                }
            }
            if !college.sports.is_empty() {
                println!("\nSports:");
                for category in college.sports {
                    println!("  {}: {}", category.category, category.sports.join(", "));
                }
            }
            if !college.facilities.is_empty() {
                println!("\nFacilities: {}", college.facilities.join(", "));
            }

            let summary = app.reviews.summary_for(college.name).await;
            let reviews = app.reviews.reviews_for(college.name).await;
            print_reviews(college.name, &reviews, &summary, 3);
        }

        Commands::Login {
            email,
            password,
            provider,
        } => {
            let identity = match provider {
                Some(name) => {
                    let provider = resolve_oauth(&name)?;
                    println!("Signing in with {}...", name);
                    app.session.sign_in_with_oauth(provider).await?
                }
                None => {
                    let email = email.ok_or_else(|| anyhow!("--email is required"))?;
                    let password = password.ok_or_else(|| anyhow!("--password is required"))?;
                    app.session.sign_in_with_password(&email, &password).await?
                }
            };
            println!("Signed in as {} <{}>", identity.display_name, identity.email);
        }

        Commands::Register {
            name,
            email,
            password,
        } => {
            let identity = app.session.register(&name, &email, &password).await?;
            println!("Welcome, {}! You are signed in.", identity.display_name);
        }

        Commands::Logout => {
            app.session.sign_out().await?;
            println!("Signed out.");
        }

        Commands::Whoami => match app.session.current() {
            Some(identity) => {
                println!("{} <{}> via {}", identity.display_name, identity.email, identity.auth_provider);
            }
            None => println!("Not signed in."),
        },

        Commands::Profile {
            name,
            email,
            university,
            address,
            image,
        } => {
            let update = ProfileUpdate {
                display_name: name,
                email,
                university,
                address,
                profile_image: image,
            };
            let editing = update.display_name.is_some()
                || update.email.is_some()
                || update.university.is_some()
                || update.address.is_some()
                || update.profile_image.is_some();

            let identity = if editing {
                let identity = app.session.update_profile(update).await?;
                println!("Profile updated.\n");
                identity
            } else {
                app.session.require()?
            };

            println!("Name:        {}", identity.display_name);
            println!("Email:       {}", identity.email);
            println!("Signed in:   {}", identity.auth_provider);
            if let Some(university) = &identity.university {
                println!("University:  {}", university);
            }
            if let Some(address) = &identity.address {
                println!("Address:     {}", address);
            }
            println!("Applications: {}", app.applications.count().await);
            println!("Reviews:      {}", app.reviews.count().await);
        }

        Commands::Apply {
            college_id,
            subject,
            phone,
            address,
            dob,
            name,
            email,
            image,
        } => {
            let identity = app.session.require()?;
            let mut form = ApplicationForm::prefilled(&identity);
            if let Some(name) = name {
                form.candidate_name = name;
            }
            if let Some(email) = email {
                form.candidate_email = email;
            }
            form.subject = subject;
            form.candidate_phone = phone;
            form.address = address;
            form.date_of_birth = Some(dob);
            form.profile_image = image;

            let record = app
                .applications
                .submit_application(&identity, form, college_id)
                .await?;
            println!(
                "Application #{} to {} submitted and under review.",
                record.id, record.college_name
            );
        }

        Commands::Applications => {
            let identity = app.session.require()?;
            let applications = app.applications.list_applications(&identity).await;
            if applications.is_empty() {
                println!("No applications yet. Use 'admit apply' to get started.");
            } else {
                println!("{:<14} {:<13} {:<26} {:<18} {:<20}", "ID", "STATUS", "COLLEGE", "SUBJECT", "SUBMITTED");
                println!("{}", "-".repeat(94));
                for application in applications {
                    println!(
                        "{:<14} {:<13} {:<26} {:<18} {:<20}",
                        application.id,
                        application.status,
                        truncate(&application.college_name, 24),
                        truncate(&application.subject, 16),
                        application.submitted_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        Commands::Status { id, status } => {
            let record = app.applications.set_status(id, status).await?;
            println!("Application #{} is now {}.", record.id, record.status);
        }

        Commands::Review {
            college,
            application,
            rating,
            comment,
        } => {
            let identity = app.session.require()?;
            let comment = comment.unwrap_or_default();
            let review = match (application, college) {
                (Some(id), _) => {
                    let application = app
                        .applications
                        .find_application(id)
                        .await
                        .ok_or(AdmitError::UnknownApplication(id))?;
                    app.reviews
                        .review_application(&identity, &application, rating, &comment)
                        .await?
                }
                (None, Some(college)) => {
                    app.reviews
                        .submit_review(Some(&identity), &college, rating, &comment)
                        .await?
                }
                (None, None) => return Err(anyhow!("Specify a college or --application")),
            };
            println!(
                "Thanks! Your {}-star review of {} has been added.",
                review.rating, review.college_name
            );
        }

        Commands::Reviews { college, recent } => {
            if recent {
                let reviews = app.reviews.recent_reviews(RECENT_REVIEW_LIMIT).await;
                let summary = summarize(&reviews);
                print_reviews("all colleges", &reviews, &summary, reviews.len());
            } else if let Some(college) = college {
                let reviews = app.reviews.reviews_for(&college).await;
                if reviews.is_empty() {
                    if let Some(suggestion) = catalog::find_by_name(&college)
                        .is_none()
                        .then(|| catalog::suggest(&college))
                        .flatten()
                    {
                        println!("No reviews for '{}'. Did you mean '{}'?", college, suggestion);
                        return Ok(());
                    }
                }
                let summary = summarize(&reviews);
                print_reviews(&college, &reviews, &summary, reviews.len());
            }
        }
    }

    Ok(())
}

fn summarize(reviews: &[ReviewRecord]) -> RatingSummary {
    RatingSummary {
        count: reviews.len(),
        average: average_rating(reviews),
    }
}

fn print_reviews(college: &str, reviews: &[ReviewRecord], summary: &RatingSummary, limit: usize) {
    let Some(average) = summary.average else {
        println!("\nNo reviews yet for {}.", college);
        return;
    };
    println!("\nReviews for {} ({}, average {:.1}/5)", college, summary.count, average);

    for review in reviews.iter().take(limit) {
        println!(
            "\n{} {} - {} on {}",
            "*".repeat(usize::from(review.rating)),
            review.author_name,
            review.college_name,
            review.submitted_at.format("%Y-%m-%d")
        );
        for line in textwrap::fill(&review.comment, 72).lines() {
            println!("  {}", line);
        }
    }

    if reviews.len() > limit {
        println!("\n...and {} more. Run 'admit reviews \"{}\"' to see all.", reviews.len() - limit, college);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
