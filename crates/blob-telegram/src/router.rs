use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use blob_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use blob_core::{
    bot::MemeBot,
    config::Config,
    memes::MemeSelector,
    messaging::{port::MessagingPort, types::BotCommand},
    scheduler::{DailyScheduler, TokioScheduler},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<MemeBot>,
    /// Our own username, used to tell `/cmd@us` from `/cmd@someone_else`.
    pub bot_username: Option<String>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Per-chat mutexes. An entry lives only while someone holds or waits on it.
#[derive(Default)]
pub struct ChatLocks {
    inner: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
}

pub struct ChatGuard {
    locks: Arc<ChatLocks>,
    chat_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ChatLocks {
    pub async fn lock_chat(self: &Arc<Self>, chat_id: i64) -> ChatGuard {
        let lock = {
            let mut map = self.map();
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        ChatGuard {
            locks: self.clone(),
            chat_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ChatGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are only taken under the map lock, so a count of 1 means nobody waits.
        let mut map = self.locks.map();
        if map
            .get(&self.chat_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.chat_id);
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("blob bot started: @{}", me.username());
            me.user.username.clone()
        }
        Err(e) => {
            warn!("get_me failed, only unaddressed commands will be answered: {e}");
            None
        }
    };

    let selector = Arc::new(MemeSelector::new(cfg.memes_dir.clone()));
    // Not fatal: requests answer with the "no memes" reply until the directory appears.
    match selector.check_dir().and_then(|_| selector.list()) {
        Ok(memes) => info!(
            dir = %cfg.memes_dir.display(),
            count = memes.len(),
            "memes directory loaded"
        ),
        Err(e) => warn!("memes directory unusable: {e}"),
    }

    if let Err(e) = register_commands(&bot).await {
        warn!("failed to register command menu: {e}");
    }

    // Throttle outbound calls: every subscription fires in the same minute.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));
    let scheduler = Arc::new(TokioScheduler::new());
    let scheduler_port: Arc<dyn DailyScheduler> = scheduler.clone();

    let state = Arc::new(AppState {
        bot: Arc::new(MemeBot::new(
            selector,
            messenger,
            scheduler_port,
            cfg.daily_meme_time,
        )),
        bot_username,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    info!("blob bot is running...");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    scheduler.shutdown().await;
    Ok(())
}

async fn register_commands(bot: &Bot) -> anyhow::Result<()> {
    let commands = BotCommand::ALL
        .iter()
        .map(|c| teloxide::types::BotCommand::new(c.name(), c.description()))
        .collect::<Vec<_>>();
    bot.set_my_commands(commands).await?;
    Ok(())
}
