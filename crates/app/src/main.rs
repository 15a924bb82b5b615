use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use saldo::Pipeline;
use saldo_core::{Account, AccountId, AccountKind, DraftId, TransactionId, UserId};

const USAGE: &str = "\
saldo - bank statement ingestion & ledger

USAGE:
    saldo add-account <user-id> <name> <kind>
    saldo import <file> <user-id> <account-id> [dialect]
    saldo review <user-id>
    saldo commit <user-id> <draft-id>...
    saldo discard <user-id> <draft-id>...
    saldo recategorize <user-id> <transaction-id> <category>
    saldo recalc <account-id>
    saldo dialects
";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print!("{USAGE}");
        return Ok(());
    };

    let project_dirs = directories::ProjectDirs::from("com", "saldo", "Saldo")
        .context("failed to resolve the application data directory")?;
    let data_dir = project_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    let db = saldo_storage::create_db(&data_dir.join("ledger.db")).await?;
    let pipeline = Pipeline::new(db);

    match command.as_str() {
        "add-account" => {
            if args.len() != 4 {
                bail!("usage: saldo add-account <user-id> <name> <kind>");
            }
            let user = UserId(parse_id(&args[1])?);
            let kind: AccountKind = args[3].parse()?;
            let account = pipeline
                .add_account(&Account::new(user, &args[2], kind))
                .await?;
            println!("created account {} ({})", account.id.unwrap(), account.kind);
        }
        "import" => {
            if args.len() < 4 {
                bail!("usage: saldo import <file> <user-id> <account-id> [dialect]");
            }
            let file = PathBuf::from(&args[1]);
            let user = UserId(parse_id(&args[2])?);
            let account = AccountId(parse_id(&args[3])?);
            let dialect = args.get(4).map(|s| s.as_str());

            let report = pipeline.import_file(&file, user, account, dialect).await?;
            if report.duplicate_file {
                println!("statement already imported; nothing staged");
                return Ok(());
            }
            println!(
                "dialect {}: staged {}, skipped {} ({} duplicates)",
                report.dialect,
                report.imported(),
                report.skipped.len(),
                report.duplicates()
            );
            for skip in &report.skipped {
                println!("  line {}: {}", skip.line, skip.reason);
            }
        }
        "review" => {
            let user = UserId(parse_id(args.get(1).context("missing <user-id>")?)?);
            for draft in pipeline.review_staged(user).await? {
                println!(
                    "#{} {} {} {} {} [{}]",
                    draft.id.unwrap(),
                    draft.date,
                    draft.kind,
                    draft.amount,
                    draft.description,
                    draft.category
                );
            }
        }
        "commit" => {
            let user = UserId(parse_id(args.get(1).context("missing <user-id>")?)?);
            let ids = draft_ids(&args[2..])?;
            let committed = pipeline.commit_staged(&ids, user).await?;
            println!("committed {} of {}", committed.len(), ids.len());
        }
        "discard" => {
            let user = UserId(parse_id(args.get(1).context("missing <user-id>")?)?);
            let ids = draft_ids(&args[2..])?;
            let count = pipeline.discard_staged(&ids, user).await?;
            println!("discarded {count}");
        }
        "recategorize" => {
            if args.len() != 4 {
                bail!("usage: saldo recategorize <user-id> <transaction-id> <category>");
            }
            let updated = pipeline
                .recategorize(
                    TransactionId(parse_id(&args[2])?),
                    &args[3],
                    UserId(parse_id(&args[1])?),
                )
                .await?;
            println!("#{} is now [{}]", updated.id.unwrap(), updated.category);
        }
        "recalc" => {
            let account = AccountId(parse_id(args.get(1).context("missing <account-id>")?)?);
            let balance = pipeline.recalculate_balance(account).await?;
            println!("balance: {balance}");
        }
        "dialects" => {
            for name in pipeline.registry().names() {
                println!("{name}");
            }
        }
        other => {
            print!("{USAGE}");
            bail!("unknown command: {other}");
        }
    }

    Ok(())
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .with_context(|| format!("not a numeric id: '{raw}'"))
}

fn draft_ids(raw: &[String]) -> Result<Vec<DraftId>> {
    if raw.is_empty() {
        bail!("expected at least one draft id");
    }
    raw.iter()
        .map(|s| parse_id(s).map(DraftId))
        .collect()
}
