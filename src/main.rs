//! # Census Console CLI (`census`)
//!
//! The `census` binary is the operator interface to the survey API. Each
//! command corresponds to one view of the console: login, the dashboard,
//! the add form, the family member list, and the household detail view.
//!
//! ## Usage
//!
//! ```bash
//! census --config ./config/census.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `census login` | Exchange credentials for a session token |
//! | `census logout` | Forget the session token |
//! | `census status` | Show the API, the session, and the dashboard |
//! | `census fields list\|add\|remove` | Manage the field schema |
//! | `census refs list\|add\|delete <category>` | Manage reference lists |
//! | `census form` | Show the add form for the current schema |
//! | `census add` | Assemble, preview, and submit a household |
//! | `census list` | Filter and page through family members |
//! | `census show <ids>` | Show one or more households |
//! | `census edit <id>` | Change a household and save it |
//! | `census delete` | Delete households (irreversible) |
//!
//! Every command except `login`, `logout`, and `status` needs a session.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use census_console::config::{self, Config};
use census_console::detail::{self, ViewMode};
use census_console::draft::{self, AddArgs};
use census_console::edit::{self, EditArgs};
use census_console::fields;
use census_console::form;
use census_console::list::{self, ListArgs};
use census_console::models::{Credentials, ReferenceCategory, Section};
use census_console::references;
use census_console::rows::Predicates;
use census_console::session::SessionContext;
use census_console::shell::{self, Route};
use census_console::store::http::HttpStore;

const PASSWORD_ENV: &str = "CENSUS_PASSWORD";

/// Census Console: administer household survey records kept by a remote
/// survey API.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. `CENSUS_API_BASE_URL` overrides the configured API address.
#[derive(Parser)]
#[command(
    name = "census",
    about = "Census Console: administer household survey records kept by a remote survey API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/census.toml`. May be absent when
    /// `CENSUS_API_BASE_URL` is set.
    #[arg(long, global = true, default_value = "./config/census.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token.
    Login {
        #[arg(long, short)]
        username: String,

        /// Password. Falls back to `CENSUS_PASSWORD`, then one line of stdin.
        #[arg(long)]
        password: Option<String>,
    },

    /// Remove the stored session token.
    Logout,

    /// Show the configured API, the session, and the dashboard entries.
    Status,

    /// Manage the field schema.
    Fields {
        #[command(subcommand)]
        action: FieldsAction,
    },

    /// Manage reference lists (ward, education, caste, sub-caste, gotra,
    /// district, tehsil).
    Refs {
        #[command(subcommand)]
        action: RefsAction,
    },

    /// Show the add form built from the current schema.
    Form,

    /// Assemble a household, preview it, and submit it.
    ///
    /// The member count is filled in automatically when the schema has a
    /// "Number of Family Members" field.
    Add {
        /// General information as FIELD=VALUE (repeatable).
        #[arg(long = "general", short = 'g', value_parser = parse_key_val)]
        general: Vec<(String, String)>,

        /// One family member as "FIELD=VALUE;FIELD=VALUE" (repeatable).
        #[arg(long = "member", short = 'm')]
        members: Vec<String>,

        /// Additional information.
        #[arg(long)]
        note: Option<String>,

        /// Submit without asking.
        #[arg(long, short)]
        yes: bool,
    },

    /// List family members across all households.
    List(ListCommand),

    /// Show households by id (`ID` or `ID,ID,...`).
    Show {
        ids: String,

        #[arg(long, value_enum, default_value = "paginated")]
        mode: ViewMode,

        /// 1-based household position in paginated mode.
        #[arg(long, default_value_t = 1)]
        position: usize,
    },

    /// Change a household and save the whole record.
    Edit {
        id: String,

        /// General information as FIELD=VALUE (repeatable).
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,

        /// Member field as N:FIELD=VALUE, N starting at 1 (repeatable).
        #[arg(long = "member-set")]
        member_set: Vec<String>,

        /// Remove the member at position N, starting at 1 (repeatable).
        #[arg(long = "remove-member", value_parser = clap::value_parser!(u64).range(1..))]
        remove_member: Vec<u64>,

        /// Replace the additional information.
        #[arg(long)]
        note: Option<String>,
    },

    /// Delete households. This cannot be undone.
    Delete {
        /// Household ids.
        ids: Vec<String>,

        /// Member row ids; their households are deleted (repeatable).
        #[arg(long = "member")]
        members: Vec<String>,

        /// Delete without asking.
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum FieldsAction {
    /// Show both field lists.
    List,
    /// Add a field to a section (`general` or `family`).
    Add { section: Section, name: String },
    /// Remove a field from a section.
    Remove { section: Section, name: String },
}

#[derive(Subcommand)]
enum RefsAction {
    /// List a category's entities.
    List { category: ReferenceCategory },
    /// Add an entity by name.
    Add {
        category: ReferenceCategory,
        name: String,
    },
    /// Delete an entity by id.
    Delete {
        category: ReferenceCategory,
        id: String,
    },
}

#[derive(Args)]
struct ListCommand {
    /// Case-insensitive text search over every value.
    #[arg(long, short = 'q', default_value = "")]
    search: String,

    #[arg(long)]
    ward: Option<String>,

    #[arg(long)]
    district: Option<String>,

    #[arg(long)]
    tehsil: Option<String>,

    #[arg(long)]
    caste: Option<String>,

    #[arg(long = "sub-caste")]
    sub_caste: Option<String>,

    /// Exclude members whose gotra is this value.
    #[arg(long = "gotra-not")]
    gotra_not: Option<String>,

    #[arg(long = "marital-status")]
    marital_status: Option<String>,

    #[arg(long)]
    gender: Option<String>,

    /// Age bucket: 0-18, 19-30, 31-50, 51+.
    #[arg(long)]
    age: Option<String>,

    /// Monthly income bucket: 0-25000, 25001-50000, 50001-100000, 100001+.
    #[arg(long)]
    income: Option<String>,

    /// Tag rows with a color per household.
    #[arg(long)]
    group: bool,

    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Print every matching row instead of one page.
    #[arg(long, conflicts_with = "page")]
    all: bool,

    /// Member row ids to resolve into a `census show` id list.
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,
}

impl ListCommand {
    fn into_args(self) -> ListArgs {
        ListArgs {
            query: self.search,
            predicates: Predicates {
                ward: self.ward,
                district: self.district,
                tehsil: self.tehsil,
                caste: self.caste,
                sub_caste: self.sub_caste,
                gotra_excluded: self.gotra_not,
                marital_status: self.marital_status,
                gender: self.gender,
                age_range: self.age,
                income_range: self.income,
            },
            group: self.group,
            page: self.page,
            all: self.all,
            select: self.select,
        }
    }
}

/// Parse a `key=value` pair for `--general` and `--set` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid FIELD=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn read_password(flag: Option<String>) -> Result<String> {
    if let Some(p) = flag {
        return Ok(p);
    }
    if let Ok(p) = std::env::var(PASSWORD_ENV) {
        return Ok(p);
    }
    if atty::is(atty::Stream::Stdin) {
        eprint!("Password: ");
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password is required (--password, {} or stdin)", PASSWORD_ENV);
    }
    Ok(password)
}

fn print_status(cfg: &Config, session: &SessionContext) {
    println!("API:     {}", cfg.base_url());
    match session.username() {
        Some(user) if session.is_authenticated() => println!("Session: logged in as {}", user),
        _ => println!("Session: not logged in"),
    }

    let shown = shell::resolve(Route::Dashboard, session);
    if shown == Route::Dashboard {
        println!();
        println!("Dashboard");
        for (route, command, description) in shell::dashboard_entries() {
            println!("  {:<20} {:<40} {}", command, description, route);
        }
    } else {
        println!("Run `census login` to open the dashboard.");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("census=warn,census_console=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let mut session = SessionContext::load(&cfg.session.path);

    match cli.command {
        Commands::Login { username, password } => {
            let password = read_password(password)?;
            let store = HttpStore::new(&cfg, None)?;
            session
                .login(&store, &Credentials { username, password })
                .await?;
            println!("Login successful.");
        }
        Commands::Logout => {
            session.logout()?;
            println!("Logged out.");
        }
        Commands::Status => {
            print_status(&cfg, &session);
        }
        command => {
            let route = match &command {
                Commands::List(_) | Commands::Edit { .. } | Commands::Delete { .. } => Route::List,
                Commands::Show { ids, .. } => Route::Detail(ids.clone()),
                _ => Route::AddRecord,
            };
            shell::require(route, &session)?;
            let store = HttpStore::new(&cfg, session.token())?;

            match command {
                Commands::Fields { action } => match action {
                    FieldsAction::List => fields::run_fields_list(&store).await?,
                    FieldsAction::Add { section, name } => {
                        fields::run_fields_add(&store, section, &name).await?
                    }
                    FieldsAction::Remove { section, name } => {
                        fields::run_fields_remove(&store, section, &name).await?
                    }
                },
                Commands::Refs { action } => match action {
                    RefsAction::List { category } => {
                        references::run_refs_list(&store, category).await?
                    }
                    RefsAction::Add { category, name } => {
                        references::run_refs_add(&store, category, &name).await?
                    }
                    RefsAction::Delete { category, id } => {
                        references::run_refs_delete(&store, category, &id).await?
                    }
                },
                Commands::Form => {
                    let (schema, refs) = tokio::join!(
                        fields::load_schema(&store),
                        references::load_all(&store)
                    );
                    form::run_form(&schema, &refs, &cfg.display.currency)?;
                }
                Commands::Add {
                    general,
                    members,
                    note,
                    yes,
                } => {
                    let (schema, refs) = tokio::join!(
                        fields::load_schema(&store),
                        references::load_all(&store)
                    );
                    let args = AddArgs {
                        general,
                        members,
                        note,
                        yes,
                    };
                    draft::run_add(&store, &schema, &refs, args, &cfg.display.currency).await?;
                }
                Commands::List(list_command) => {
                    list::run_list(&store, &cfg.display, list_command.into_args()).await?;
                }
                Commands::Show {
                    ids,
                    mode,
                    position,
                } => {
                    detail::run_show(&store, &ids, mode, position, &cfg.display.currency).await?;
                }
                Commands::Edit {
                    id,
                    set,
                    member_set,
                    remove_member,
                    note,
                } => {
                    let (schema, refs) = tokio::join!(
                        fields::load_schema(&store),
                        references::load_all(&store)
                    );
                    let args = EditArgs {
                        set,
                        member_set,
                        remove_member: remove_member.into_iter().map(|n| n as usize).collect(),
                        note,
                    };
                    edit::run_edit(&store, &schema, &refs, &id, args).await?;
                }
                Commands::Delete { ids, members, yes } => {
                    list::run_delete(&store, &ids, &members, yes).await?;
                }
                Commands::Login { .. } | Commands::Logout | Commands::Status => {
                    // Handled above (no session required)
                    unreachable!()
                }
            }
        }
    }

    Ok(())
}
