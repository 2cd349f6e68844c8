//! The operator command loop.
//!
//! Listens on the transport's inbound stream and routes operator commands to
//! campaign operations. Every recognized command produces exactly one reply
//! message; long-running flows (validation, batch sends) additionally emit
//! progress notifications along the way. Messages from anyone other than the
//! operator are ignored except for `!help`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Mutex;

use outreach_campaign::contact::{is_valid_mobile, Contact, ContactStatus};
use outreach_campaign::limits::{can_send, SendVerdict};
use outreach_campaign::{
    personalize, CampaignEngine, CampaignState, ContactStore, ImportReport, StartError,
};
use outreach_core::types::IncomingMessage;
use outreach_core::{OutreachConfig, Provider, Result, Transport};

use crate::commands::{self, Command, TemplateChoice};

/// Pause between existence lookups during `!validate`, so a long validation
/// run does not look like a flood to the platform.
const VALIDATE_PAUSE: Duration = Duration::from_secs(2);

pub struct Bot {
    config: OutreachConfig,
    transport: Arc<dyn Transport>,
    store: Arc<Mutex<ContactStore>>,
    engine: CampaignEngine,
    provider: Option<Box<dyn Provider>>,
    uploads_dir: PathBuf,
}

impl Bot {
    pub fn new(
        config: OutreachConfig,
        transport: Arc<dyn Transport>,
        store: Arc<Mutex<ContactStore>>,
        provider: Option<Box<dyn Provider>>,
        uploads_dir: PathBuf,
    ) -> Self {
        let engine = CampaignEngine::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            config.sending.clone(),
        );
        Self { config, transport, store, engine, provider, uploads_dir }
    }

    /// Run the inbound loop until the stream ends.
    pub async fn run(&self) -> Result<()> {
        let mut stream = self.transport.listen().await?;

        while let Some(message) = stream.next().await {
            if let Err(e) = self.handle_message(message).await {
                tracing::warn!("⚠️ Failed to handle message: {e}");
            }
        }

        tracing::info!("Inbound stream closed, bot loop exiting");
        Ok(())
    }

    async fn handle_message(&self, message: IncomingMessage) -> Result<()> {
        let text = message.content.trim();

        if !message.from_operator {
            // Strangers only ever get the public help text. No AI
            // auto-replies, no command access.
            if text == "!help" {
                self.reply(&message.sender_id, PUBLIC_HELP).await;
            }
            return Ok(());
        }

        tracing::info!("[operator] {}", text);
        let Some(command) = commands::parse(text) else {
            return Ok(());
        };

        self.store.lock().await.roll_over_day();
        let reply = self.execute(command, &message.sender_id).await;
        self.reply(&message.sender_id, &reply).await;
        Ok(())
    }

    /// Execute one command and produce its reply.
    async fn execute(&self, command: Command, reply_to: &str) -> String {
        match command {
            Command::Add { phone, name } => self.handle_add(&phone, name).await,
            Command::Import { path } => self.handle_import(&path).await,
            Command::Scan => self.handle_scan().await,
            Command::List => self.handle_list().await,
            Command::Stats => self.handle_stats().await,
            Command::Validate => self.handle_validate(reply_to).await,
            Command::QuickValidate => self.handle_quick_validate().await,
            Command::Clean => {
                let removed = self.store.lock().await.prune_by_status(ContactStatus::Blocked);
                format!("🧹 Removed {removed} blocked contacts")
            }
            Command::CleanInvalid => self.handle_clean_invalid().await,
            Command::Clear => self.handle_clear().await,
            Command::ClearConfirm => {
                let removed = self.store.lock().await.clear_all();
                format!("🗑️ Removed {removed} contacts. The list is now empty.")
            }
            Command::Send(choice) => match self.template_for(choice) {
                Some(template) => self.manual_send(template, None, reply_to).await,
                None => "❌ That template is not configured. See !texts.".into(),
            },
            Command::SendCustom { text } => self.manual_send(text, None, reply_to).await,
            Command::Batch { size, text } => self.manual_send(text, Some(size), reply_to).await,
            Command::Test => self.handle_test().await,
            Command::Texts => self.handle_texts(),
            Command::AutoStart => self.handle_auto_start(reply_to).await,
            Command::AutoStop => {
                if self.engine.stop() {
                    "🛑 Automatic campaign STOPPED".into()
                } else {
                    "ℹ️ No automatic campaign is running".into()
                }
            }
            Command::AutoStatus => self.handle_auto_status().await,
            Command::Reset => {
                let reset = self.store.lock().await.reset_sent_markers();
                format!("🔄 Cleared send markers on {reset} contacts. The full list is eligible again.")
            }
            Command::ResetCounter => {
                self.store.lock().await.reset_daily_counter();
                "🔄 Daily counter reset to 0".into()
            }
            Command::SetCounter { value } => {
                self.store.lock().await.set_daily_counter(value);
                format!("🔄 Daily counter set to {value}")
            }
            Command::Ai { prompt } => self.handle_ai(&prompt, reply_to).await,
            Command::AiReset => match &self.provider {
                Some(provider) => {
                    provider.reset(reply_to).await;
                    "🧠 Conversation context cleared".into()
                }
                None => "❌ AI provider is not configured".into(),
            },
            Command::Help => OPERATOR_HELP.into(),
        }
    }

    // ─── Contact management ───────────────────────────────

    async fn handle_add(&self, phone: &str, name: Option<String>) -> String {
        let mut store = self.store.lock().await;
        match store.add(phone, name.clone(), None) {
            Ok(contact) => match &contact.name {
                Some(n) => format!("✅ Contact {} added ({n})", contact.phone),
                None => format!("✅ Contact {} added", contact.phone),
            },
            Err(e) => format!("❌ {e}"),
        }
    }

    async fn import_file(&self, path: &str) -> std::result::Result<ImportReport, String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Cannot read {path}: {e}"))?;
        let source = file_name(path);
        Ok(self.store.lock().await.import_lines(content.lines(), Some(&source)))
    }

    async fn handle_import(&self, path: &str) -> String {
        let report = match self.import_file(path).await {
            Ok(report) => report,
            Err(e) => return format!("❌ {e}"),
        };

        let mut reply = format!("📁 Import finished:\n✅ Added: {}", report.added);
        if !report.errors.is_empty() {
            reply.push_str(&format!("\n❌ Errors: {}", report.errors.len()));
            for error in report.errors.iter().take(5) {
                reply.push_str(&format!("\n• {error}"));
            }
        }
        reply
    }

    async fn handle_scan(&self) -> String {
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&self.uploads_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("txt") | Some("csv")
                    )
                })
                .collect(),
            Err(e) => return format!("❌ Cannot scan {}: {e}", self.uploads_dir.display()),
        };
        files.sort();

        if files.is_empty() {
            return format!(
                "📁 No contact files found.\n\nDrop .txt/.csv files into {} and run !scan again.",
                self.uploads_dir.display()
            );
        }

        let mut reply = format!("📁 Found {} file(s):\n", files.len());
        let mut total = 0;
        for file in &files {
            match self.import_file(&file.to_string_lossy()).await {
                Ok(report) => {
                    reply.push_str(&format!(
                        "\n📄 {}:\n  ✅ Added: {}\n  ❌ Errors: {}\n",
                        file.display(),
                        report.added,
                        report.errors.len()
                    ));
                    total += report.added;
                }
                Err(e) => reply.push_str(&format!("\n📄 {}:\n  ❌ {e}\n", file.display())),
            }
        }
        reply.push_str(&format!("\n🎉 Total added: {total} contacts"));
        reply
    }

    async fn handle_list(&self) -> String {
        let store = self.store.lock().await;
        if store.is_empty() {
            return "📱 The contact list is empty".into();
        }

        let mut reply = format!("📱 Contacts ({}):\n\n", store.len());
        for (i, contact) in store.all().iter().take(20).enumerate() {
            let glyph = status_glyph(contact.status);
            reply.push_str(&format!("{}. {glyph} {}", i + 1, contact.phone));
            if let Some(name) = &contact.name {
                reply.push_str(&format!(" ({name})"));
            }
            if let Some(source) = &contact.source {
                reply.push_str(&format!(" [{source}]"));
            }
            reply.push('\n');
        }
        if store.len() > 20 {
            reply.push_str(&format!("\n... and {} more\n", store.len() - 20));
        }

        let counts = store.counts();
        reply.push_str(&format!(
            "\n📊 Summary:\n✅ Active: {}\n⏳ Pending: {}\n❌ Blocked: {}\n❓ Invalid: {}",
            counts.active, counts.pending, counts.blocked, counts.invalid
        ));
        reply
    }

    async fn handle_stats(&self) -> String {
        let store = self.store.lock().await;
        let counts = store.counts();
        let stats = store.stats();
        let limits = store.limits();

        let last_batch = stats
            .last_batch_time
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".into());

        format!(
            "📊 Detailed statistics:\n\n\
             📱 CONTACTS:\n• Total: {}\n• Active: {}\n• Pending: {}\n• Blocked: {}\n• Invalid: {}\n\n\
             📤 SENDING:\n• Today: {}/{}\n• Total sent: {}\n• Last batch: {}\n\n\
             ⚙️ LIMITS:\n• Batch size: {}\n• Daily limit: {}\n• Delay: {}-{} s\n• Batch cooldown: {} min",
            counts.total,
            counts.active,
            counts.pending,
            counts.blocked,
            counts.invalid,
            stats.sent_today,
            limits.daily_limit,
            stats.total_sent,
            last_batch,
            limits.batch_size,
            limits.daily_limit,
            limits.min_delay_secs,
            limits.max_delay_secs,
            limits.batch_cooldown_secs / 60
        )
    }

    // ─── Validation ───────────────────────────────────────

    async fn handle_validate(&self, reply_to: &str) -> String {
        let contacts: Vec<Contact> = self.store.lock().await.all().to_vec();
        if contacts.is_empty() {
            return "📱 No contacts to validate".into();
        }

        self.notify(reply_to, &format!("🔍 Validating {} contacts...", contacts.len()))
            .await;

        let mut format_invalid = 0;
        let mut on_network = 0;
        let mut off_network = 0;
        let mut checked = 0;

        for contact in &contacts {
            if !is_valid_mobile(&contact.phone) {
                format_invalid += 1;
                self.store.lock().await.mark_invalid(&contact.phone);
                continue;
            }

            let exists = self
                .transport
                .exists_on_network(&contact.phone)
                .await
                .unwrap_or(false);
            checked += 1;
            if exists {
                on_network += 1;
            } else {
                off_network += 1;
                self.store.lock().await.mark_invalid(&contact.phone);
            }

            if checked % 10 == 0 {
                self.notify(reply_to, &format!(
                    "⏳ Checked {checked}/{} (✅{on_network} ❌{off_network})",
                    contacts.len()
                ))
                .await;
            }

            tokio::time::sleep(VALIDATE_PAUSE).await;
        }

        format!(
            "📊 Full validation finished:\n\n\
             📱 FORMAT:\n✅ Valid: {}\n❌ Invalid: {format_invalid}\n\n\
             💬 ON WHATSAPP ({checked} checked):\n✅ Registered: {on_network}\n❌ Not registered: {off_network}\n\n\
             🎯 Next steps:\n• !cleaninvalid removes the invalid ones\n• !autostart begins the campaign with {on_network} ready contacts",
            contacts.len() - format_invalid
        )
    }

    async fn handle_quick_validate(&self) -> String {
        let mut store = self.store.lock().await;
        let contacts: Vec<String> = store.all().iter().map(|c| c.phone.clone()).collect();
        if contacts.is_empty() {
            return "📱 No contacts to validate".into();
        }

        let mut invalid = 0;
        for phone in &contacts {
            if !is_valid_mobile(phone) {
                store.mark_invalid(phone);
                invalid += 1;
            }
        }
        let valid = contacts.len() - invalid;

        format!(
            "📊 Quick format validation finished:\n\n\
             ✅ Valid: {valid}\n❌ Invalid: {invalid}\n\n\
             🎯 Commands:\n• !cleaninvalid — remove invalid numbers\n• !validate — full WhatsApp check\n• !autostart — start the campaign"
        )
    }

    async fn handle_clean_invalid(&self) -> String {
        let mut store = self.store.lock().await;

        // Sweep format failures into Invalid first so one command cleans both
        // marked and never-validated junk numbers.
        let bad: Vec<String> = store
            .all()
            .iter()
            .filter(|c| !is_valid_mobile(&c.phone))
            .map(|c| c.phone.clone())
            .collect();
        for phone in &bad {
            store.mark_invalid(phone);
        }

        let before = store.len();
        let removed = store.prune_by_status(ContactStatus::Invalid);
        format!(
            "🧹 Invalid number cleanup:\n\n❌ Removed: {removed}\n📱 Contacts before: {before}\n📱 Contacts now: {}",
            store.len()
        )
    }

    async fn handle_clear(&self) -> String {
        let total = self.store.lock().await.len();
        if total == 0 {
            return "ℹ️ The contact list is already empty".into();
        }
        format!(
            "⚠️ This will delete ALL {total} contacts.\n\nSend \"!clear confirm\" to proceed."
        )
    }

    // ─── Sending ──────────────────────────────────────────

    fn template_for(&self, choice: TemplateChoice) -> Option<String> {
        let template = match choice {
            TemplateChoice::Primary => &self.config.templates.primary,
            TemplateChoice::Alt1 => &self.config.templates.alt1,
            TemplateChoice::Alt2 => &self.config.templates.alt2,
            TemplateChoice::Alt3 => &self.config.templates.alt3,
        };
        if template.trim().is_empty() {
            None
        } else {
            Some(template.clone())
        }
    }

    /// The `!send` / `!batch` path: one limiter-gated batch, dispatched
    /// immediately and reported when done.
    async fn manual_send(
        &self,
        template: String,
        batch_size: Option<usize>,
        reply_to: &str,
    ) -> String {
        let (batch, verdict) = {
            let store = self.store.lock().await;
            let batch = store.eligible(batch_size);
            let verdict = can_send(store.stats(), store.limits(), batch.len() as u32, Utc::now());
            (batch, verdict)
        };

        if batch.is_empty() {
            return "📱 No contacts available for sending".into();
        }
        if let SendVerdict::Denied(reason) = verdict {
            return format!("❌ {reason}");
        }

        self.notify(reply_to, &format!(
            "🚀 Starting personalized send to {} contacts...",
            batch.len()
        ))
        .await;

        let outcome = self.engine.dispatch_batch(&batch, &template, reply_to).await;

        let store = self.store.lock().await;
        let stats = store.stats();
        format!(
            "🎉 Personalized send finished!\n\n\
             📊 RESULT:\n✅ Sent: {}\n❌ Failed: {}\n📱 Contacts: {}\n\n\
             📈 TODAY:\n📤 Sent today: {}/{}\n🔄 Total sent: {}",
            outcome.sent,
            outcome.failed,
            batch.len(),
            stats.sent_today,
            store.limits().daily_limit,
            stats.total_sent
        )
    }

    async fn handle_test(&self) -> String {
        let contacts: Vec<Contact> = {
            let store = self.store.lock().await;
            store.all().iter().take(3).cloned().collect()
        };
        if contacts.is_empty() {
            return "📱 No contacts to preview personalization with".into();
        }

        let mut reply = String::from("🧪 PERSONALIZATION PREVIEW:\n\n");
        for contact in &contacts {
            let rendered = personalize::render(&self.config.templates.primary, contact);
            reply.push_str(&format!(
                "📱 {} → {}\n📝 {}\n\n---\n\n",
                contact.phone,
                contact.name.as_deref().unwrap_or("unnamed"),
                rendered
            ));
        }
        reply
    }

    fn handle_texts(&self) -> String {
        let t = &self.config.templates;
        let show = |s: &str| {
            if s.trim().is_empty() { "(not configured)".to_string() } else { s.to_string() }
        };
        format!(
            "📝 CAMPAIGN TEMPLATES:\n\n\
             🤖 PRIMARY (!send):\n{}\n\n\
             💼 TEXT 1 (!send1):\n{}\n\n\
             🔥 TEXT 2 (!send2):\n{}\n\n\
             ⚡ TEXT 3 (!send3):\n{}\n\n\
             ✏️ Use {{OrganizationName}} in a template for automatic substitution.\n\
             📤 !send YOUR TEXT sends a custom message.",
            show(&t.primary),
            show(&t.alt1),
            show(&t.alt2),
            show(&t.alt3)
        )
    }

    // ─── Automatic campaign ───────────────────────────────

    async fn handle_auto_start(&self, reply_to: &str) -> String {
        let template = self.config.templates.primary.clone();
        match self.engine.start(template.clone(), reply_to.to_string()).await {
            Ok(plan) => {
                let hours =
                    (plan.batches as u64 * self.config.sending.batch_cooldown_secs).div_ceil(3600);
                format!(
                    "🚀 AUTOMATIC CAMPAIGN STARTED\n\n\
                     📊 Plan:\n• Contacts: {}\n• Batch size: {}\n• Batches: {}\n• Interval: {} min\n• Estimated time: ~{} h\n\n\
                     📤 Message:\n{}\n\n\
                     ⏰ First batch in {} seconds.\nStop: !autostop\nStatus: !autostatus",
                    plan.total_contacts,
                    plan.batch_size,
                    plan.batches,
                    plan.interval_minutes,
                    hours,
                    template,
                    self.config.sending.start_delay_secs
                )
            }
            Err(StartError::AlreadyRunning) => {
                "⚠️ A campaign is already running! Use !autostop first.".into()
            }
            Err(StartError::NothingToSend) => {
                "📱 Nothing to send: every eligible contact has been attempted.\nUse !reset to start a fresh pass.".into()
            }
            Err(StartError::QuotaExhausted { sent_today, daily_limit }) => format!(
                "❌ Daily quota exhausted ({sent_today}/{daily_limit}). Try again tomorrow or !resetcounter."
            ),
        }
    }

    async fn handle_auto_status(&self) -> String {
        let status = self.engine.status();
        let state = match status.state {
            CampaignState::Running => "🟢 RUNNING",
            CampaignState::Stopped => "🔴 STOPPED",
            CampaignState::Idle => "⚪ IDLE",
        };

        let store = self.store.lock().await;
        let counts = store.counts();
        let stats = store.stats();
        let limits = store.limits();

        format!(
            "📊 AUTOMATIC CAMPAIGN STATUS\n\n\
             🤖 State: {state}\n\
             📦 Batches: {}/{}\n\
             ✅ Sent this run: {} (❌{})\n\n\
             ⚙️ SETTINGS:\n• Batch size: {}\n• Interval: {} min\n• Daily limit: {}\n\n\
             📱 CONTACTS:\n• Total: {}\n• Active: {}\n• Pending: {}\n• Blocked: {}\n\n\
             📤 TODAY: {}/{} (total {})\n\n\
             📝 Message:\n{}",
            status.batches_done,
            status.batches_total,
            status.sent,
            status.failed,
            limits.batch_size,
            limits.batch_cooldown_secs / 60,
            limits.daily_limit,
            counts.total,
            counts.active,
            counts.pending,
            counts.blocked,
            stats.sent_today,
            limits.daily_limit,
            stats.total_sent,
            self.config.templates.primary
        )
    }

    // ─── AI ───────────────────────────────────────────────

    async fn handle_ai(&self, prompt: &str, conversation_key: &str) -> String {
        let Some(provider) = &self.provider else {
            return "❌ AI provider is not configured (set api_key in config)".into();
        };

        tracing::info!("[ai] {}", prompt);
        match provider.complete(prompt, conversation_key).await {
            Ok(answer) => answer,
            Err(e) => format!("❌ AI request failed: {e}"),
        }
    }

    // ─── Plumbing ─────────────────────────────────────────

    async fn reply(&self, to: &str, text: &str) {
        if let Err(e) = self.transport.send_text(to, text).await {
            tracing::warn!("⚠️ Failed to send reply: {e}");
        }
    }

    async fn notify(&self, to: &str, text: &str) {
        self.reply(to, text).await;
    }
}

fn status_glyph(status: ContactStatus) -> &'static str {
    match status {
        ContactStatus::Active => "✅",
        ContactStatus::Pending => "⏳",
        ContactStatus::Blocked => "❌",
        ContactStatus::Invalid => "❓",
    }
}

fn file_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

const PUBLIC_HELP: &str = "🤖 WhatsApp Bot\n\n\
ℹ️ This account is used for outbound messaging only.\n\
Automatic replies are disabled.\n\n\
If you have questions, contact the administrator directly.";

const OPERATOR_HELP: &str = "🤖 Outreach — WhatsApp campaign bot\n\n\
📱 CONTACTS:\n\
!add +number[,name] — add a contact\n\
!import path/file.txt — import from a file\n\
!scan — import every file from the uploads folder\n\
!list — show contacts\n\
!quickvalidate — format check\n\
!validate — full check (format + WhatsApp)\n\
!clean — remove blocked\n\
!cleaninvalid — remove invalid numbers\n\
!clear — remove ALL contacts (asks to confirm)\n\
!stats — detailed statistics\n\n\
📤 SENDING:\n\
!send — primary template\n\
!send1 / !send2 / !send3 — alternate templates\n\
!send YOUR TEXT — custom message\n\
!batch 15 TEXT — custom batch size\n\
!texts — show templates\n\
!test — personalization preview\n\n\
🤖 AUTOMATIC CAMPAIGN:\n\
!autostart — start\n\
!autostop — stop (resumable)\n\
!autostatus — status and settings\n\n\
🔧 ADMIN:\n\
!reset — clear send markers for a fresh pass\n\
!resetcounter — zero today's counter\n\
!setcounter N — set today's counter\n\n\
🧠 AI (operator only):\n\
!ai question — ask the assistant\n\
!aireset — clear conversation context\n\n\
📋 RECOMMENDED FLOW:\n\
1. !scan  2. !quickvalidate  3. !cleaninvalid  4. !validate  5. !clean  6. !autostart";

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::Stream;
    use outreach_core::error::Result as CoreResult;
    use std::sync::Mutex as SyncMutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: SyncMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "mock"
        }
        async fn connect(&mut self) -> CoreResult<()> {
            Ok(())
        }
        async fn disconnect(&mut self) -> CoreResult<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        async fn listen(&self) -> CoreResult<Box<dyn Stream<Item = IncomingMessage> + Send + Unpin>> {
            Ok(Box::new(futures::stream::empty()))
        }
        async fn send_text(&self, to: &str, body: &str) -> CoreResult<()> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
        async fn exists_on_network(&self, _phone: &str) -> CoreResult<bool> {
            Ok(true)
        }
    }

    fn test_bot(name: &str) -> (Bot, Arc<RecordingTransport>, PathBuf) {
        let dir = std::env::temp_dir().join(format!("outreach-test-bot-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        let config = OutreachConfig::default();
        let store = Arc::new(Mutex::new(ContactStore::open(&dir, config.sending.clone())));
        let transport = Arc::new(RecordingTransport::default());
        let bot = Bot::new(
            config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            store,
            None,
            dir.join("uploads"),
        );
        (bot, transport, dir)
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (bot, _transport, dir) = test_bot("add-list");

        let reply = bot
            .execute(Command::Add { phone: "+77012345678".into(), name: Some("Acme".into()) }, "op")
            .await;
        assert!(reply.contains("✅"));
        assert!(reply.contains("+77012345678"));

        let reply = bot.execute(Command::List, "op").await;
        assert!(reply.contains("+77012345678"));
        assert!(reply.contains("(Acme)"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_duplicate_add_reported() {
        let (bot, _transport, dir) = test_bot("dup");
        bot.execute(Command::Add { phone: "+77012345678".into(), name: None }, "op").await;
        let reply = bot
            .execute(Command::Add { phone: "8 701 234 56 78".into(), name: None }, "op")
            .await;
        assert!(reply.contains("already exists"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let (bot, _transport, dir) = test_bot("clear");
        bot.execute(Command::Add { phone: "+77012345678".into(), name: None }, "op").await;

        let reply = bot.execute(Command::Clear, "op").await;
        assert!(reply.contains("!clear confirm"));
        assert_eq!(bot.store.lock().await.len(), 1);

        let reply = bot.execute(Command::ClearConfirm, "op").await;
        assert!(reply.contains("Removed 1"));
        assert!(bot.store.lock().await.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_quick_validate_marks_invalid() {
        let (bot, _transport, dir) = test_bot("quickvalidate");
        // 10-digit number passing the generic rule but failing the KZ rule
        bot.execute(Command::Add { phone: "+7901234567".into(), name: None }, "op").await;
        bot.execute(Command::Add { phone: "+77012345678".into(), name: None }, "op").await;

        let reply = bot.execute(Command::QuickValidate, "op").await;
        assert!(reply.contains("✅ Valid: 1"));
        assert!(reply.contains("❌ Invalid: 1"));

        let store = bot.store.lock().await;
        assert_eq!(store.get("+7901234567").unwrap().status, ContactStatus::Invalid);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_counter_commands() {
        let (bot, _transport, dir) = test_bot("counters");
        let reply = bot.execute(Command::SetCounter { value: 9 }, "op").await;
        assert!(reply.contains("9"));
        assert_eq!(bot.store.lock().await.stats().sent_today, 9);

        bot.execute(Command::ResetCounter, "op").await;
        assert_eq!(bot.store.lock().await.stats().sent_today, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_ai_without_provider() {
        let (bot, _transport, dir) = test_bot("no-ai");
        let reply = bot.execute(Command::Ai { prompt: "hi".into() }, "op").await;
        assert!(reply.contains("not configured"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_non_operator_only_gets_public_help() {
        let (bot, transport, dir) = test_bot("stranger");

        let stranger = IncomingMessage {
            channel: "whatsapp".into(),
            sender_id: "79160000000".into(),
            sender_name: None,
            content: "!stats".into(),
            from_operator: false,
            thread_type: outreach_core::types::ThreadType::Direct,
            timestamp: Utc::now(),
        };
        bot.handle_message(stranger.clone()).await.unwrap();

        let help = IncomingMessage { content: "!help".into(), ..stranger };
        bot.handle_message(help).await.unwrap();

        // The stranger's !stats was ignored; only the public help went out
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "79160000000");
        assert!(sent[0].1.contains("outbound messaging only"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
