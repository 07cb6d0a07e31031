//! Voice entry command.
//!
//! `khata voice <clip>` runs one capture → parse → reconcile → confirm
//! cycle on a recorded clip:
//! - a missing category/party is offered for quick-create
//! - the parsed draft is shown for accept / reject / edit
//! - Ctrl-C abandons the draft; a late backend response is discarded

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;

use crate::adapters::{Backend, BackendClient};
use crate::capture::FileDevice;
use crate::config;
use crate::domain::{
    DraftDetails, EntryDraft, EntryKind, LedgerTransactionType, WorkflowState,
};
use crate::journal::Journal;
use crate::workflow::{
    resolve_date, Change, Clock, EditBuffer, SystemClock, Transition, VoiceSession, WorkflowError,
};

#[derive(Args, Debug)]
pub struct VoiceArgs {
    /// Recorded audio clip (webm, m4a, ogg, mp3, wav)
    pub audio: PathBuf,

    /// Create missing references and accept without prompting
    #[arg(short, long)]
    pub yes: bool,
}

/// Line-based prompts that give up when the workflow is cancelled
struct Prompter<R = BufReader<Stdin>> {
    lines: Lines<R>,
}

impl Prompter {
    fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Prompter<R> {
    fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// `None` when cancelled or stdin closed
    async fn ask(&mut self, question: &str, token: &CancellationToken) -> Result<Option<String>> {
        print!("{} ", question);
        std::io::stdout().flush()?;

        tokio::select! {
            _ = token.cancelled() => {
                println!();
                Ok(None)
            }
            line = self.lines.next_line() => Ok(line?.map(|l| l.trim().to_string())),
        }
    }

    /// Ask with a default shown in brackets; empty input keeps it
    async fn ask_default(
        &mut self,
        label: &str,
        current: &str,
        token: &CancellationToken,
    ) -> Result<Option<String>> {
        let answer = self.ask(&format!("  {} [{}]:", label, current), token).await?;
        Ok(answer.map(|a| if a.is_empty() { current.to_string() } else { a }))
    }
}

/// Execute the voice command
pub async fn execute(args: VoiceArgs) -> Result<()> {
    let config = config::config()?;
    let backend: Arc<dyn Backend> = Arc::new(BackendClient::from_settings(&config.api)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut session = VoiceSession::open(
        Box::new(FileDevice::new(&args.audio)),
        backend,
        Arc::clone(&clock),
        config.min_clip_bytes,
    )
    .await?;
    if let Some(path) = &config.journal_path {
        session = session.with_journal(Journal::open(path)?);
    }

    session.start_capture()?;
    println!("🎙  Processing {}", args.audio.display());
    session.stop_capture().await?;

    // Ctrl-C abandons this workflow instance
    let token = session.reconciler().cancellation_token();
    let ctrl_c_token = token.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let mut prompter = Prompter::stdin();
    let result = confirm_loop(&mut session, &mut prompter, &token, clock.as_ref(), args.yes).await;
    ctrl_c.abort();
    result
}

async fn confirm_loop<R: AsyncBufRead + Unpin>(
    session: &mut VoiceSession,
    prompter: &mut Prompter<R>,
    token: &CancellationToken,
    clock: &dyn Clock,
    yes: bool,
) -> Result<()> {
    loop {
        let outcome = match session.state().clone() {
            WorkflowState::NeedsReference { kind, name } => {
                println!();
                println!("⚠️  {} '{}' does not exist yet.", kind, name);
                let answer = if yes {
                    Some("y".to_string())
                } else {
                    prompter
                        .ask(&format!("Add {} '{}'? [y/N or another name]:", kind, name), token)
                        .await?
                };
                match answer.as_deref() {
                    None | Some("") | Some("n") | Some("N") | Some("no") => Ok(session.abandon()),
                    Some("y") | Some("Y") | Some("yes") => session.quick_create(&name).await,
                    Some(other) => session.quick_create(other).await,
                }
            }
            WorkflowState::AwaitingConfirmation => {
                if let Some(draft) = session.reconciler().draft() {
                    print_draft(draft, clock.today());
                }
                let choice = if yes {
                    Some(Confirm::Accept)
                } else {
                    ask_confirmation(prompter, token).await?
                };
                match choice {
                    None | Some(Confirm::Reject) => Ok(session.reject()),
                    Some(Confirm::Accept) => session.accept().await,
                    Some(Confirm::Edit) => session.edit(),
                }
            }
            WorkflowState::Editing => {
                let edited = match session.reconciler().edit_buffer() {
                    Some(buffer) => edit_form(buffer.clone(), prompter, token).await?,
                    None => None,
                };
                match edited {
                    None => Ok(session.cancel()),
                    Some(buffer) => {
                        if let Some(slot) = session.reconciler_mut().edit_buffer_mut() {
                            *slot = buffer;
                        }
                        session.save().await
                    }
                }
            }
            WorkflowState::Idle | WorkflowState::Abandoned | WorkflowState::Committing => break,
        };

        match outcome {
            Ok(transition) => report_transition(&transition),
            Err(WorkflowError::Cancelled) => {
                println!("✗ Cancelled, entry discarded");
                break;
            }
            Err(err) => {
                println!("✗ {}", err);
                // Unattended runs would repeat the same failing action forever
                if yes {
                    report_transition(&discard(session));
                    break;
                }
            }
        }
    }

    Ok(())
}

enum Confirm {
    Accept,
    Reject,
    Edit,
}

/// `None` when cancelled or stdin closed
async fn ask_confirmation<R: AsyncBufRead + Unpin>(
    prompter: &mut Prompter<R>,
    token: &CancellationToken,
) -> Result<Option<Confirm>> {
    loop {
        let answer = prompter.ask("[a]ccept / [r]eject / [e]dit:", token).await?;
        match answer.as_deref() {
            None => return Ok(None),
            Some("a") | Some("accept") => return Ok(Some(Confirm::Accept)),
            Some("r") | Some("reject") => return Ok(Some(Confirm::Reject)),
            Some("e") | Some("edit") => return Ok(Some(Confirm::Edit)),
            Some(_) => println!("  Please answer a, r or e"),
        }
    }
}

/// Drop whatever draft is open, from any state
fn discard(session: &mut VoiceSession) -> Transition {
    match session.state().clone() {
        WorkflowState::NeedsReference { .. } => session.abandon(),
        WorkflowState::Editing => session.cancel(),
        _ => session.reject(),
    }
}

fn report_transition(transition: &Transition) {
    match &transition.change {
        Change::ReferenceCreated { kind, entity } => {
            println!("✅ Added {} '{}'", kind, entity.name)
        }
        Change::Committed { entry, commit_key } => {
            println!("✅ Saved {} ({})", entry.entry.summary(), entry.id);
            println!("   commit {}", commit_key);
        }
        Change::Discarded(reason) => println!("🗑  Entry discarded ({})", reason.name()),
        _ => {}
    }
}

fn print_draft(draft: &EntryDraft, today: NaiveDate) {
    println!();
    println!("Parsed entry");
    println!("══════════════════════════════════════════════════════════════");
    match &draft.details {
        DraftDetails::Expense { category_name, .. } => {
            println!("Type:        Expense");
            println!("Category:    {}", category_name);
        }
        DraftDetails::LedgerTransaction(ledger) => {
            println!("Type:        Ledger - {}", ledger.transaction_type.label());
            println!("Party:       {}", ledger.party_name);
            if let Some(item) = &ledger.item_name {
                println!("Item:        {}", item);
            }
            if let Some(quantity) = ledger.quantity {
                println!(
                    "Quantity:    {} {}",
                    quantity,
                    ledger.unit.as_deref().unwrap_or("")
                );
            }
            if let Some(rate) = ledger.rate {
                println!("Rate:        ₹{}", rate);
            }
        }
    }
    match draft.amount {
        Some(amount) => println!("Amount:      ₹{}", amount),
        None => println!("Amount:      (missing, edit to add)"),
    }
    let description = draft.effective_description();
    if !description.is_empty() {
        println!("Description: {}", description);
    }
    if let Ok(date) = resolve_date(today, draft.date_offset_days) {
        println!("Date:        {}", date);
    }
    if let Some(confidence) = draft.confidence {
        println!("Confidence:  {:.0}%", confidence * 100.0);
    }
    println!();
}

/// Walk the form fields; `None` when the user cancels
async fn edit_form<R: AsyncBufRead + Unpin>(
    mut buffer: EditBuffer,
    prompter: &mut Prompter<R>,
    token: &CancellationToken,
) -> Result<Option<EditBuffer>> {
    println!();
    println!("Edit entry (Enter keeps the current value)");

    macro_rules! field {
        ($label:expr, $target:expr) => {
            match prompter.ask_default($label, &$target, token).await? {
                Some(value) => $target = value,
                None => return Ok(None),
            }
        };
    }

    let reference_label = match buffer.kind() {
        EntryKind::Expense => "Category",
        EntryKind::LedgerTransaction => "Party",
    };
    field!(reference_label, buffer.reference);

    if buffer.kind() == EntryKind::LedgerTransaction {
        let mut entry_type = buffer.transaction_type.as_str().to_string();
        field!("Type", entry_type);
        match LedgerTransactionType::from_wire(&entry_type) {
            Some(t) => buffer.transaction_type = t,
            None => println!("  Unknown type '{}', keeping {}", entry_type, buffer.transaction_type.as_str()),
        }
        field!("Item", buffer.item_name);
        field!("Quantity", buffer.quantity);
        field!("Unit", buffer.unit);
        field!("Rate", buffer.rate);
    }

    field!("Amount", buffer.amount);
    field!("Description", buffer.description);

    let mut date = buffer.date.to_string();
    field!("Date", date);
    match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        Ok(parsed) => buffer.date = parsed,
        Err(_) => println!("  Invalid date '{}', keeping {}", date, buffer.date),
    }

    Ok(Some(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::domain::ReferenceKind;
    use crate::workflow::FixedClock;
    use std::time::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    async fn session_with(backend: &Arc<InMemoryBackend>, draft: EntryDraft) -> VoiceSession {
        let mut session = VoiceSession::open(
            Box::new(FileDevice::new("unused.webm")),
            backend.clone(),
            Arc::new(FixedClock::new(today())),
            100,
        )
        .await
        .unwrap();
        session.reconciler_mut().evaluate(draft).unwrap();
        session
    }

    async fn run_unattended(session: &mut VoiceSession) {
        let token = session.reconciler().cancellation_token();
        let clock = FixedClock::new(today());
        let mut prompter = Prompter::from_reader(&b""[..]);
        tokio::time::timeout(
            Duration::from_secs(2),
            confirm_loop(session, &mut prompter, &token, &clock, true),
        )
        .await
        .expect("confirm loop did not finish")
        .unwrap();
    }

    #[tokio::test]
    async fn test_yes_creates_and_accepts() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut session = session_with(&backend, EntryDraft::expense(500.0, "Fuel")).await;

        run_unattended(&mut session).await;

        assert_eq!(session.state(), &WorkflowState::Idle);
        assert_eq!(backend.persisted().len(), 1);
        assert_eq!(backend.references(ReferenceKind::Category).len(), 1);
    }

    #[tokio::test]
    async fn test_yes_discards_draft_without_amount() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_reference(ReferenceKind::Category, "Fuel");
        let mut draft = EntryDraft::expense(0.0, "Fuel");
        draft.amount = None;
        let mut session = session_with(&backend, draft).await;

        run_unattended(&mut session).await;

        assert_eq!(session.state(), &WorkflowState::Abandoned);
        assert!(backend.persisted().is_empty());
    }

    #[tokio::test]
    async fn test_yes_discards_after_backend_failure() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_reference(ReferenceKind::Category, "Fuel");
        backend.fail_next_persist(WorkflowError::Network("connection refused".to_string()));
        let mut session = session_with(&backend, EntryDraft::expense(500.0, "Fuel")).await;

        run_unattended(&mut session).await;

        assert_eq!(session.state(), &WorkflowState::Abandoned);
        assert!(backend.persisted().is_empty());
    }

    #[tokio::test]
    async fn test_yes_abandons_blank_party() {
        let backend = Arc::new(InMemoryBackend::new());
        let draft = EntryDraft::ledger(300.0, "", LedgerTransactionType::PaymentReceived);
        let mut session = session_with(&backend, draft).await;

        run_unattended(&mut session).await;

        assert_eq!(session.state(), &WorkflowState::Abandoned);
        assert!(backend.references(ReferenceKind::Party).is_empty());
        assert!(backend.persisted().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognised_answer_asks_again() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_reference(ReferenceKind::Category, "Fuel");
        let mut session = session_with(&backend, EntryDraft::expense(500.0, "Fuel")).await;
        let token = session.reconciler().cancellation_token();

        let mut prompter = Prompter::from_reader(&b"maybe\n\nr\n"[..]);
        let choice = ask_confirmation(&mut prompter, &token).await.unwrap();
        assert!(matches!(choice, Some(Confirm::Reject)));
    }

    #[tokio::test]
    async fn test_edit_answers_flow_into_saved_entry() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_reference(ReferenceKind::Category, "Fuel");
        let mut session = session_with(&backend, EntryDraft::expense(500.0, "Fuel")).await;
        let token = session.reconciler().cancellation_token();
        let clock = FixedClock::new(today());

        // Edit, keep category, change amount, keep description and date
        let mut prompter = Prompter::from_reader(&b"e\n\n450\n\n\n"[..]);
        confirm_loop(&mut session, &mut prompter, &token, &clock, false)
            .await
            .unwrap();

        assert_eq!(session.state(), &WorkflowState::Idle);
        assert_eq!(backend.persisted()[0].entry.amount(), 450.0);
    }

    #[tokio::test]
    async fn test_closed_input_rejects_draft() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_reference(ReferenceKind::Category, "Fuel");
        let mut session = session_with(&backend, EntryDraft::expense(500.0, "Fuel")).await;
        let token = session.reconciler().cancellation_token();
        let clock = FixedClock::new(today());

        let mut prompter = Prompter::from_reader(&b""[..]);
        confirm_loop(&mut session, &mut prompter, &token, &clock, false)
            .await
            .unwrap();

        assert_eq!(session.state(), &WorkflowState::Abandoned);
        assert!(backend.persisted().is_empty());
    }
}
