use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

struct Pending {
    ticket: u64,
    handle: JoinHandle<()>,
}

type PendingMap<K> = Arc<Mutex<HashMap<K, Pending>>>;

/// Debounce de flanco final por clave: cada `schedule` reemplaza lo que
/// estuviera pendiente para esa clave, y solo la última llamada dentro de la
/// ventana llega a ejecutarse. Claves distintas no se pisan.
pub struct Debouncer<K> {
    delay: Duration,
    pending: PendingMap<K>,
    next_ticket: AtomicU64,
}

fn lock<K>(map: &Mutex<HashMap<K, Pending>>) -> MutexGuard<'_, HashMap<K, Pending>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn schedule<F>(&self, key: K, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        let task_key = key.clone();

        let mut map = lock(&self.pending);
        let handle = tokio::spawn(async move {
            sleep(delay).await;

            // vencida la ventana, la escritura ya no se puede cancelar
            {
                let mut map = lock(&pending);
                match map.get(&task_key) {
                    Some(p) if p.ticket == ticket => {
                        map.remove(&task_key);
                    }
                    _ => return,
                }
            }

            job.await;
        });

        if let Some(previous) = map.insert(key, Pending { ticket, handle }) {
            previous.handle.abort();
        }
    }

    /// Cantidad de claves con una escritura todavía en la ventana.
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Descarta lo pendiente para `key`. Una escritura que ya salió sigue.
    pub fn cancel(&self, key: &K) {
        if let Some(p) = lock(&self.pending).remove(key) {
            p.handle.abort();
        }
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, p) in lock(&self.pending).drain() {
            p.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;

    type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Job) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let make = move |value: &str| {
            let sink = Arc::clone(&sink);
            let value = value.to_string();
            Box::pin(async move {
                sink.lock().unwrap().push(value);
            }) as Job
        };
        (seen, make)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_calls_collapse_into_the_last_one() {
        let debouncer = Debouncer::new(Duration::from_millis(1000));
        let (seen, job) = recorder();

        debouncer.schedule("p1", job("X"));
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule("p1", job("XY"));
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule("p1", job("XYZ"));
        assert_eq!(debouncer.pending(), 1);

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["XYZ".to_string()]);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_do_not_cancel_each_other() {
        let debouncer = Debouncer::new(Duration::from_millis(1000));
        let (seen, job) = recorder();

        debouncer.schedule("p1", job("a"));
        debouncer.schedule("p2", job("b"));
        sleep(Duration::from_millis(1500)).await;

        let mut got = seen.lock().unwrap().clone();
        got.sort();
        assert_eq!(got, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_only_drops_one_key() {
        let debouncer = Debouncer::new(Duration::from_millis(1000));
        let (seen, job) = recorder();

        debouncer.schedule("p1", job("a"));
        debouncer.schedule("p2", job("b"));
        debouncer.cancel(&"p1");
        sleep(Duration::from_millis(1500)).await;

        assert_eq!(*seen.lock().unwrap(), vec!["b".to_string()]);
    }
}
