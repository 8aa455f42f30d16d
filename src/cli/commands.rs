use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use time::Date;

use crate::app::{App, AppError, EditOp, PostFilter};
use crate::config::AppConfig;
use crate::content::{ContentItem, MediaRef};
use crate::post::{parse_date, Hashtags, Post};
use crate::search::{apply_regex, parse_query};
use crate::server;
use crate::session::ComposeSession;
use crate::storage::PostRepository;

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only show posts in this category
    #[arg(long)]
    pub category: Option<String>,
    /// Only show posts with a hashtag containing this text
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Post identifier
    pub id: i64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PostFields {
    /// Body text; `-` reads it from stdin
    #[arg(long)]
    pub body: Option<String>,
    /// Post date as YYYY-MM-DD (defaults to today for new posts)
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<Date>,
    /// Comma separated hashtags
    #[arg(long)]
    pub tags: Option<String>,
    /// Category label
    #[arg(long)]
    pub category: Option<String>,
    /// Attach an image or video, optionally captioned as PATH=CAPTION (repeatable)
    #[arg(long = "media", value_name = "PATH[=CAPTION]")]
    pub media: Vec<String>,
    /// Content block operation, applied in order (repeatable):
    /// "text ...", "code LANG ...", "set N ...", "delete N", "move N up|down",
    /// "reorder FROM TO", "caption N ..."
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<EditOp>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct NewArgs {
    /// Title for the post (prompted if omitted)
    #[arg(long)]
    pub title: Option<String>,
    /// Append a text block (repeatable)
    #[arg(long = "text")]
    pub texts: Vec<String>,
    /// Append a code block read from a file, as LANG=PATH (repeatable)
    #[arg(long = "code", value_name = "LANG=PATH")]
    pub code: Vec<String>,
    #[command(flatten)]
    pub fields: PostFields,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// Post identifier
    pub id: i64,
    /// Replace the title
    #[arg(long)]
    pub title: Option<String>,
    #[command(flatten)]
    pub fields: PostFields,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Post identifier
    pub id: i64,
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Search query terms (supports tag:, #tag, category:, date: ranges)
    #[arg()]
    pub query: Vec<String>,
    /// Treat the free terms as a regular expression over title and body
    #[arg(long)]
    pub regex: bool,
    /// Limit the number of results printed
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum OwnerCommand {
    /// Enable owner mode (prompts for the password if omitted)
    Unlock {
        #[arg(long)]
        password: Option<String>,
    },
    /// Disable owner mode
    Lock,
    /// Print whether owner mode is enabled
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct OwnerArgs {
    #[command(subcommand)]
    pub command: OwnerCommand,
}

pub fn serve(config: &AppConfig, repo: PostRepository) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime
        .block_on(server::serve(&config.server, repo))
        .context("running http server")
}

/// Runs a non-server command and returns what it prints.
pub fn dispatch(app: &mut App, command: super::Commands) -> Result<String> {
    use super::Commands;

    let mutates = matches!(
        command,
        Commands::New(_) | Commands::Edit(_) | Commands::Delete(_)
    );
    if mutates && !app.config.storage.backend.persists() {
        bail!(
            "the memory storage backend keeps posts only for this process; \
             switch `[storage] backend` to \"json-file\" to change posts from the command line"
        );
    }

    match command {
        Commands::List(args) => Ok(list_posts(app, args)),
        Commands::Show(args) => show_post(app, args),
        Commands::New(args) => new_post(app, args),
        Commands::Edit(args) => edit_post(app, args),
        Commands::Delete(args) => delete_post(app, args),
        Commands::Search(args) => search_posts(app, &args),
        Commands::Owner(args) => owner(app, args),
        Commands::Serve => bail!("serve is handled before dispatch"),
    }
}

fn list_posts(app: &mut App, args: ListArgs) -> String {
    let filter = match (args.category, args.tag) {
        (Some(category), _) => PostFilter::Category(category),
        (None, Some(tag)) => PostFilter::Hashtag(tag),
        (None, None) => PostFilter::All,
    };
    let empty_message = if filter == PostFilter::All {
        "No posts yet.\n"
    } else {
        "No posts match this filter.\n"
    };
    app.set_filter(filter);
    let posts = app.visible_posts();
    if posts.is_empty() {
        return empty_message.to_string();
    }
    format_post_list(&posts)
}

fn show_post(app: &App, args: ShowArgs) -> Result<String> {
    let post = app
        .repository()
        .get(args.id)
        .ok_or(AppError::UnknownPost(args.id))?;
    Ok(format_post(post))
}

fn new_post(app: &mut App, args: NewArgs) -> Result<String> {
    let title = match args.title {
        Some(title) => title,
        None => prompt("Title")?,
    };
    let session = app.open_compose()?;
    session.draft.title = title;
    for text in args.texts {
        session.content_mut().append(ContentItem::text(text));
    }
    for spec in &args.code {
        let (language, path) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("code block {spec:?} must look like LANG=PATH"))?;
        let source = fs::read_to_string(path).with_context(|| format!("reading code file {path}"))?;
        session.content_mut().append(ContentItem::code(language, source));
    }
    fill_session(app, args.fields)?;
    publish(app, "Published")
}

fn edit_post(app: &mut App, args: EditArgs) -> Result<String> {
    let session = app.open_edit(args.id)?;
    if let Some(title) = args.title {
        session.draft.title = title;
    }
    fill_session(app, args.fields)?;
    publish(app, "Updated")
}

fn fill_session(app: &mut App, fields: PostFields) -> Result<()> {
    let session = app.session_mut()?;
    if let Some(body) = fields.body {
        session.draft.body = if body == "-" { read_stdin()? } else { body };
    }
    if let Some(date) = fields.date {
        session.draft.date = Some(date);
    }
    if let Some(tags) = fields.tags {
        session.draft.hashtags = Hashtags::parse(&tags);
    }
    if let Some(category) = fields.category {
        session.draft.category = Some(category);
    }
    attach_media(session, &fields.media)?;
    for op in &fields.ops {
        app.apply(op)?;
    }
    Ok(())
}

/// Reads every attachment through the upload queue so blocks land in the
/// order they were given.
fn attach_media(session: &mut ComposeSession, specs: &[String]) -> Result<()> {
    let tickets: Vec<_> = specs.iter().map(|_| session.reserve_upload()).collect();
    for (spec, ticket) in specs.iter().zip(tickets) {
        let (path, caption) = spec.split_once('=').unwrap_or((spec.as_str(), ""));
        match MediaRef::from_path(&PathBuf::from(path)) {
            Ok(media) => {
                tracing::debug!(path, bytes = media.encoded_len(), "attached media");
                session.complete_upload(ticket, media, caption)?;
            }
            Err(err) => {
                tracing::warn!(path, error = %err, "skipping media attachment");
                session.abandon_upload(ticket)?;
            }
        }
    }
    Ok(())
}

fn publish(app: &mut App, verb: &str) -> Result<String> {
    match app.submit_session() {
        Ok(id) => Ok(format!("{verb} post #{id}\n")),
        Err(err @ AppError::Storage(_)) => {
            let notice = app
                .state_mut()
                .take_notice()
                .map(|notice| notice.message)
                .unwrap_or_else(|| err.to_string());
            Err(anyhow!(err).context(notice))
        }
        Err(err) => Err(err.into()),
    }
}

fn delete_post(app: &mut App, args: DeleteArgs) -> Result<String> {
    let skip = args.yes;
    let mut confirm = |question: &str| {
        skip || prompt(&format!("{question} [y/N]"))
            .is_ok_and(|answer| answer.trim().eq_ignore_ascii_case("y"))
    };
    match app.delete_post(args.id, &mut confirm) {
        Ok(post) => Ok(format!("Deleted post #{} ({})\n", post.id, post.title)),
        Err(AppError::Cancelled) => Ok("Nothing deleted.\n".to_string()),
        Err(err) => Err(err.into()),
    }
}

fn search_posts(app: &App, args: &SearchArgs) -> Result<String> {
    let raw_query = args.query.join(" ");
    let trimmed = raw_query.trim();
    if trimmed.is_empty() {
        bail!("search query cannot be empty");
    }
    let mut query = parse_query(trimmed);
    if args.regex {
        apply_regex(&mut query, trimmed).context("compiling regex search pattern")?;
    }
    if query.is_empty() {
        bail!("search query must contain terms or filters");
    }
    let limit = args.limit.unwrap_or(app.config.search.max_results);
    let results = app.repository().search(&query, limit);
    if results.is_empty() {
        return Ok("No matches found.\n".to_string());
    }
    Ok(format_post_list(&results))
}

fn owner(app: &mut App, args: OwnerArgs) -> Result<String> {
    match args.command {
        OwnerCommand::Unlock { password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Owner password")?,
            };
            app.unlock_owner(&password)?;
            Ok("Owner mode enabled.\n".to_string())
        }
        OwnerCommand::Lock => {
            app.lock_owner()?;
            Ok("Owner mode disabled.\n".to_string())
        }
        OwnerCommand::Status => Ok(if app.state().owner.is_unlocked() {
            "Owner mode is enabled.\n".to_string()
        } else {
            "Owner mode is disabled.\n".to_string()
        }),
    }
}

fn format_post_list(posts: &[&Post]) -> String {
    let mut out = String::new();
    for post in posts {
        let mut headline = format!("#{}  {}", post.id, post.title);
        if let Some(category) = &post.category {
            let _ = write!(&mut headline, "  [{category}]");
        }
        let _ = writeln!(&mut out, "{headline}");
        let mut meta = format!("    {}", post.date);
        if !post.hashtags.is_empty() {
            let _ = write!(&mut meta, "  {}", post.hashtags);
        }
        if !post.items.is_empty() {
            let _ = write!(&mut meta, "  ({} block(s))", post.items.len());
        }
        let _ = writeln!(&mut out, "{meta}");
        let summary = post.summary();
        if !summary.is_empty() {
            let _ = writeln!(&mut out, "    {summary}");
        }
        out.push('\n');
    }
    out
}

fn format_post(post: &Post) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "#{}  {}", post.id, post.title);
    let _ = writeln!(&mut out, "date      {}", post.date);
    if let Some(category) = &post.category {
        let _ = writeln!(&mut out, "category  {category}");
    }
    if !post.hashtags.is_empty() {
        let _ = writeln!(&mut out, "tags      {}", post.hashtags);
    }
    if !post.body.is_empty() {
        let _ = writeln!(&mut out, "\n{}", post.body);
    }
    for (position, stored) in post.items.iter().enumerate() {
        out.push('\n');
        match &stored.item {
            ContentItem::Text { content } => {
                let _ = writeln!(&mut out, "[{position}] text");
                for line in content.lines() {
                    let _ = writeln!(&mut out, "    {line}");
                }
            }
            ContentItem::Code { language, source } => {
                let _ = writeln!(&mut out, "[{position}] code ({language})");
                for line in source.lines() {
                    let _ = writeln!(&mut out, "    {line}");
                }
            }
            ContentItem::Media(media) => {
                let _ = writeln!(&mut out, "[{position}] {} {}", media.kind, media.filename);
            }
        }
        if !stored.caption.is_empty() {
            let _ = writeln!(&mut out, "    -- {}", stored.caption);
        }
    }
    out
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    parse_date(raw).ok_or_else(|| format!("{raw:?} is not a YYYY-MM-DD date"))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading body from stdin")?;
    Ok(buf)
}
