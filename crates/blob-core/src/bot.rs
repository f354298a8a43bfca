//! The three bot operations, independent of Telegram.

use std::sync::Arc;

use chrono::{NaiveTime, Timelike};
use tracing::{info, warn};

use crate::{
    domain::ChatId,
    memes::{MemeFile, MemeSelector},
    messaging::port::MessagingPort,
    scheduler::{DailyScheduler, JobCallback, JobFuture},
    Result,
};

pub const NO_MEMES_TEXT: &str = "No memes available right now. 😢";
pub const MEME_INTRO_TEXT: &str = "Here's a Big Boi Blob meme for you! 🎉";
pub const DAILY_INTRO_TEXT: &str = "🌅 Here's your daily Big Boi Blob meme!";
pub const NOT_SUBSCRIBED_TEXT: &str = "You don't have an active daily meme subscription.";
pub const UNSUBSCRIBED_TEXT: &str = "❌ Unsubscribed from daily blob memes.";

pub fn subscribed_text(at: NaiveTime) -> String {
    format!(
        "✅ Subscribed! You'll receive a daily blob meme every day at {}:{:02} UTC.\n\
Use /stopdaily to unsubscribe.",
        at.hour(),
        at.minute()
    )
}

#[derive(Clone)]
pub struct MemeBot {
    selector: Arc<MemeSelector>,
    messenger: Arc<dyn MessagingPort>,
    scheduler: Arc<dyn DailyScheduler>,
    daily_at: NaiveTime,
}

impl MemeBot {
    pub fn new(
        selector: Arc<MemeSelector>,
        messenger: Arc<dyn MessagingPort>,
        scheduler: Arc<dyn DailyScheduler>,
        daily_at: NaiveTime,
    ) -> Self {
        Self {
            selector,
            messenger,
            scheduler,
            daily_at,
        }
    }

    /// `/start`: reply with a random meme, or an apology when there is none.
    pub async fn send_meme(&self, chat_id: ChatId) -> Result<()> {
        let Some(meme) = pick(&self.selector) else {
            self.messenger.send_text(chat_id, NO_MEMES_TEXT).await?;
            return Ok(());
        };

        self.deliver(chat_id, &meme, MEME_INTRO_TEXT).await
    }

    /// `/daily`: replace any daily job for the chat with a fresh one.
    pub async fn subscribe(&self, chat_id: ChatId) -> Result<()> {
        let key = chat_id.subscription_key();
        self.scheduler.cancel_all_for_key(&key).await;
        self.scheduler
            .register_daily(&key, self.daily_at, self.daily_job(chat_id))
            .await?;

        self.messenger
            .send_text(chat_id, &subscribed_text(self.daily_at))
            .await?;
        info!(chat = chat_id.0, "subscribed to daily meme");
        Ok(())
    }

    /// `/stopdaily`: cancel every daily job for the chat.
    pub async fn unsubscribe(&self, chat_id: ChatId) -> Result<()> {
        let key = chat_id.subscription_key();
        let jobs = self.scheduler.list_for_key(&key).await;
        if jobs.is_empty() {
            self.messenger
                .send_text(chat_id, NOT_SUBSCRIBED_TEXT)
                .await?;
            return Ok(());
        }

        for job in jobs {
            self.scheduler.cancel(job.id).await;
        }
        self.messenger.send_text(chat_id, UNSUBSCRIBED_TEXT).await?;
        info!(chat = chat_id.0, "unsubscribed from daily meme");
        Ok(())
    }

    /// Body of the daily job. Silent when there is nothing to send.
    pub async fn send_daily_meme(&self, chat_id: ChatId) -> Result<()> {
        let Some(meme) = pick(&self.selector) else {
            return Ok(());
        };

        self.deliver(chat_id, &meme, DAILY_INTRO_TEXT).await
    }

    /// Intro text then photo. The file is read first, so a vanished file sends nothing.
    async fn deliver(&self, chat_id: ChatId, meme: &MemeFile, intro: &str) -> Result<()> {
        let photo = meme.read().await?;
        self.messenger.send_text(chat_id, intro).await?;
        self.messenger.send_photo(chat_id, photo).await?;
        info!(chat = chat_id.0, meme = %meme.file_name(), "sent meme");
        Ok(())
    }

    fn daily_job(&self, chat_id: ChatId) -> JobCallback {
        let bot = self.clone();
        Arc::new(move || {
            let bot = bot.clone();
            let fut: JobFuture = Box::pin(async move {
                if let Err(e) = bot.send_daily_meme(chat_id).await {
                    warn!(chat = chat_id.0, "daily meme failed: {e}");
                }
            });
            fut
        })
    }
}

/// An unreadable directory is logged and treated like an empty one.
fn pick(selector: &MemeSelector) -> Option<MemeFile> {
    match selector.pick_random() {
        Ok(meme) => meme,
        Err(e) => {
            warn!(dir = %selector.dir().display(), "cannot list memes: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        errors::Error,
        memes::tests::TmpDir,
        messaging::types::OutgoingPhoto,
        scheduler::{JobId, JobInfo, TokioScheduler},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Sent {
        Text(i64, String),
        Photo(i64, String),
    }

    #[derive(Default)]
    struct FakeMessenger {
        sent: Mutex<Vec<Sent>>,
    }

    impl FakeMessenger {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn reply(&self, chat_id: ChatId) -> MessageRef {
            let id = self.sent.lock().unwrap().len() as i32;
            MessageRef {
                chat_id,
                message_id: MessageId(id),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Text(chat_id.0, text.to_string()));
            Ok(self.reply(chat_id))
        }

        async fn send_photo(&self, chat_id: ChatId, photo: OutgoingPhoto) -> Result<MessageRef> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Photo(chat_id.0, photo.file_name));
            Ok(self.reply(chat_id))
        }
    }

    /// Messenger whose every call fails, as when Telegram is unreachable.
    #[derive(Default)]
    struct DownMessenger {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl MessagingPort for DownMessenger {
        async fn send_text(&self, _chat_id: ChatId, _text: &str) -> Result<MessageRef> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::External("telegram error: network down".to_string()))
        }

        async fn send_photo(&self, _chat_id: ChatId, _photo: OutgoingPhoto) -> Result<MessageRef> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::External("telegram error: network down".to_string()))
        }
    }

    /// Real scheduler that counts cancellations.
    #[derive(Default)]
    struct CountingScheduler {
        inner: TokioScheduler,
        cancels: AtomicUsize,
    }

    #[async_trait]
    impl DailyScheduler for CountingScheduler {
        async fn register_daily(
            &self,
            key: &str,
            at: NaiveTime,
            callback: JobCallback,
        ) -> Result<JobId> {
            self.inner.register_daily(key, at, callback).await
        }

        async fn cancel(&self, job: JobId) -> bool {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            self.inner.cancel(job).await
        }

        async fn cancel_all_for_key(&self, key: &str) -> usize {
            let n = self.inner.cancel_all_for_key(key).await;
            self.cancels.fetch_add(n, Ordering::SeqCst);
            n
        }

        async fn list_for_key(&self, key: &str) -> Vec<JobInfo> {
            self.inner.list_for_key(key).await
        }
    }

    struct Harness {
        bot: MemeBot,
        messenger: Arc<FakeMessenger>,
        scheduler: Arc<CountingScheduler>,
        _dir: TmpDir,
    }

    fn harness(prefix: &str, files: &[&str]) -> Harness {
        let dir = TmpDir::with_files(prefix, files);
        let messenger = Arc::new(FakeMessenger::default());
        let scheduler = Arc::new(CountingScheduler::default());
        let bot = MemeBot::new(
            Arc::new(MemeSelector::new(&dir.0)),
            messenger.clone(),
            scheduler.clone(),
            crate::config::daily_meme_time(),
        );
        Harness {
            bot,
            messenger,
            scheduler,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn send_meme_replies_with_text_then_photo() {
        let h = harness("send", &["a.png"]);
        h.bot.send_meme(ChatId(5)).await.unwrap();
        assert_eq!(
            h.messenger.sent(),
            vec![
                Sent::Text(5, MEME_INTRO_TEXT.to_string()),
                Sent::Photo(5, "a.png".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn send_meme_without_memes_sends_only_an_apology() {
        let h = harness("send-empty", &["notes.txt"]);
        h.bot.send_meme(ChatId(5)).await.unwrap();
        assert_eq!(
            h.messenger.sent(),
            vec![Sent::Text(5, NO_MEMES_TEXT.to_string())]
        );
    }

    #[tokio::test]
    async fn send_meme_with_missing_dir_apologizes() {
        let messenger = Arc::new(FakeMessenger::default());
        let bot = MemeBot::new(
            Arc::new(MemeSelector::new("/no/such/blob/memes")),
            messenger.clone(),
            Arc::new(TokioScheduler::new()),
            crate::config::daily_meme_time(),
        );
        bot.send_meme(ChatId(9)).await.unwrap();
        assert_eq!(messenger.sent(), vec![Sent::Text(9, NO_MEMES_TEXT.to_string())]);
    }

    #[tokio::test]
    async fn subscribing_twice_leaves_one_job() {
        let h = harness("sub", &["a.png"]);
        h.bot.subscribe(ChatId(1)).await.unwrap();
        h.bot.subscribe(ChatId(1)).await.unwrap();

        let jobs = h.scheduler.list_for_key("1").await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].key, "1");
        assert_eq!(h.scheduler.cancels.load(Ordering::SeqCst), 1);

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 2);
        let Sent::Text(1, text) = &sent[0] else {
            panic!("expected a text reply, got {sent:?}");
        };
        assert!(text.contains("Subscribed"));
        assert!(text.contains("9:00 UTC"));
        assert!(text.contains("/stopdaily"));
    }

    #[tokio::test]
    async fn subscriptions_are_per_chat() {
        let h = harness("sub-per-chat", &["a.png"]);
        h.bot.subscribe(ChatId(1)).await.unwrap();
        h.bot.subscribe(ChatId(2)).await.unwrap();
        assert_eq!(h.scheduler.list_for_key("1").await.len(), 1);
        assert_eq!(h.scheduler.list_for_key("2").await.len(), 1);
        assert_eq!(h.scheduler.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribe_without_subscription_only_replies() {
        let h = harness("unsub-none", &["a.png"]);
        h.bot.unsubscribe(ChatId(2)).await.unwrap();

        assert_eq!(h.scheduler.cancels.load(Ordering::SeqCst), 0);
        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Text(2, t) if t.contains("don't have an active")));
    }

    #[tokio::test]
    async fn unsubscribe_cancels_every_job_for_the_chat() {
        let h = harness("unsub", &["a.png"]);
        let noop: JobCallback = Arc::new(|| -> JobFuture { Box::pin(async {}) });
        let at = crate::config::daily_meme_time();
        h.scheduler.register_daily("3", at, noop.clone()).await.unwrap();
        h.scheduler.register_daily("3", at, noop.clone()).await.unwrap();
        h.scheduler.register_daily("4", at, noop).await.unwrap();

        h.bot.unsubscribe(ChatId(3)).await.unwrap();

        assert!(h.scheduler.list_for_key("3").await.is_empty());
        assert_eq!(h.scheduler.list_for_key("4").await.len(), 1);
        assert_eq!(h.scheduler.cancels.load(Ordering::SeqCst), 2);
        assert_eq!(
            h.messenger.sent(),
            vec![Sent::Text(3, UNSUBSCRIBED_TEXT.to_string())]
        );

        h.bot.unsubscribe(ChatId(3)).await.unwrap();
        assert!(
            matches!(h.messenger.sent().last(), Some(Sent::Text(3, t)) if t == NOT_SUBSCRIBED_TEXT)
        );
    }

    #[tokio::test]
    async fn daily_job_sends_announcement_then_photo() {
        let h = harness("daily", &["blob.gif"]);
        (h.bot.daily_job(ChatId(8)))().await;
        assert_eq!(
            h.messenger.sent(),
            vec![
                Sent::Text(8, DAILY_INTRO_TEXT.to_string()),
                Sent::Photo(8, "blob.gif".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn daily_job_is_silent_without_memes() {
        let h = harness("daily-empty", &[]);
        (h.bot.daily_job(ChatId(8)))().await;
        assert!(h.messenger.sent().is_empty());
    }

    #[test]
    fn subscribed_text_pads_minutes() {
        let at = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        assert!(subscribed_text(at).contains("9:05 UTC"));
    }

    fn down_bot(dir: &TmpDir) -> (MemeBot, Arc<DownMessenger>, Arc<TokioScheduler>) {
        let messenger = Arc::new(DownMessenger::default());
        let scheduler = Arc::new(TokioScheduler::new());
        let bot = MemeBot::new(
            Arc::new(MemeSelector::new(&dir.0)),
            messenger.clone(),
            scheduler.clone(),
            crate::config::daily_meme_time(),
        );
        (bot, messenger, scheduler)
    }

    #[tokio::test]
    async fn subscribe_keeps_one_job_when_the_reply_fails() {
        let dir = TmpDir::with_files("down-sub", &["a.png"]);
        let (bot, messenger, scheduler) = down_bot(&dir);

        assert!(matches!(bot.subscribe(ChatId(1)).await, Err(Error::External(_))));
        assert!(bot.subscribe(ChatId(1)).await.is_err());

        assert_eq!(scheduler.list_for_key("1").await.len(), 1);
        assert_eq!(messenger.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn daily_job_swallows_send_errors() {
        let dir = TmpDir::with_files("down-daily", &["a.png"]);
        let (bot, messenger, _scheduler) = down_bot(&dir);

        (bot.daily_job(ChatId(1)))().await;

        // Stopped at the failed intro; the photo was never attempted.
        assert_eq!(messenger.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn vanished_meme_fails_without_sending_anything() {
        let h = harness("vanished", &["a.png"]);
        let meme = h.bot.selector.pick_random().unwrap().unwrap();
        std::fs::remove_file(meme.path()).unwrap();

        let res = h.bot.deliver(ChatId(5), &meme, MEME_INTRO_TEXT).await;

        assert!(matches!(res, Err(Error::Io(_))));
        assert!(h.messenger.sent().is_empty());

        // The next request sees the directory as it is now.
        h.bot.send_meme(ChatId(5)).await.unwrap();
        assert_eq!(
            h.messenger.sent(),
            vec![Sent::Text(5, NO_MEMES_TEXT.to_string())]
        );
    }
}
