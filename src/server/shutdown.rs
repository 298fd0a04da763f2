use tokio::sync::{Mutex, RwLock, broadcast, mpsc};

// Notifier tells session tasks that the server is going down and lets the
// server wait until they have all wound down.
#[derive(Debug)]
pub struct Notifier {
    shutdown_tx: RwLock<Option<broadcast::Sender<()>>>,
    shutdown_complete_tx: RwLock<Option<mpsc::Sender<()>>>,
    shutdown_complete_rx: Mutex<mpsc::Receiver<()>>,
}

impl Notifier {
    pub fn new() -> Notifier {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);
        Notifier {
            shutdown_tx: RwLock::new(Some(shutdown_tx)),
            shutdown_complete_tx: RwLock::new(Some(shutdown_complete_tx)),
            shutdown_complete_rx: Mutex::new(shutdown_complete_rx),
        }
    }

    // Signals all subscribed listeners. Dropping the broadcast sender wakes
    // every `listen()` call; listeners acknowledge completion by going out of
    // scope, which releases their clone of the completion sender.
    pub async fn notify(&self) {
        drop(self.shutdown_tx.write().await.take());
        drop(self.shutdown_complete_tx.write().await.take())
    }

    // Waits until every Listener handed out by subscribe() has been dropped.
    pub async fn linger(&self) {
        let _ = self.shutdown_complete_rx.lock().await.recv().await;
    }

    pub async fn subscribe(&self) -> Listener {
        let sender_opt = self.shutdown_tx.read().await;
        let complete_sender_opt = self.shutdown_complete_tx.read().await;
        Listener {
            shutdown: sender_opt.is_none(),
            shutdown_rx: sender_opt.as_ref().map(|tx| tx.subscribe()),
            _shutdown_complete_tx: complete_sender_opt.clone(),
        }
    }
}

// One per session task. Holding it keeps the server's linger() waiting.
#[derive(Debug)]
pub struct Listener {
    shutdown: bool,
    shutdown_rx: Option<broadcast::Receiver<()>>,
    _shutdown_complete_tx: Option<mpsc::Sender<()>>,
}

impl Listener {
    // Waits for the shutdown notice. Returns immediately once it has been
    // seen, so this is safe to poll repeatedly inside a select loop.
    pub async fn listen(&mut self) {
        if self.shutdown {
            return;
        }
        // Only one value is ever sent so a lag error cannot happen.
        if let Some(rx) = self.shutdown_rx.as_mut() {
            let _ = rx.recv().await;
        }
        self.shutdown = true;
    }
}
