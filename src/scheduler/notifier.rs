//! 通知分发
//!
//! [`EventSupport`] 保存监听器列表和状态，并保证终止通知只发出一次。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::models::SharedPlan;
use crate::scheduler::{SchedulerListener, SchedulingState};

pub struct EventSupport {
    listeners: Mutex<Vec<Arc<dyn SchedulerListener>>>,
    terminated: AtomicBool,
    state: watch::Sender<SchedulingState>,
}

impl EventSupport {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SchedulingState::Idle);
        Self {
            listeners: Mutex::new(Vec::new()),
            terminated: AtomicBool::new(false),
            state,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn SchedulerListener>) {
        self.lock_listeners().push(listener);
    }

    pub fn state(&self) -> SchedulingState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SchedulingState> {
        self.state.subscribe()
    }

    /// 推进到非终止状态；已经终止时忽略
    pub fn set_state(&self, next: SchedulingState) {
        debug_assert!(!next.is_terminal());
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    pub fn progress(&self, progress: f64) {
        for listener in self.snapshot() {
            listener.on_progress(progress);
        }
    }

    pub fn warning(&self, message: &str) {
        for listener in self.snapshot() {
            listener.on_warning(message);
        }
    }

    /// 发出成功通知；只有第一次终止调用生效，返回是否生效
    pub fn finish(&self, plan: &SharedPlan) -> bool {
        if !self.claim_terminal() {
            return false;
        }
        let listeners = self.snapshot();
        for listener in &listeners {
            listener.on_progress(1.0);
        }
        for listener in &listeners {
            listener.on_finished(plan);
        }
        self.state.send_replace(SchedulingState::Succeeded);
        true
    }

    /// 发出失败通知；只有第一次终止调用生效，返回是否生效
    pub fn fail(&self, reason: &str) -> bool {
        if !self.claim_terminal() {
            debug!("忽略重复的终止通知: {}", reason);
            return false;
        }
        let listeners = self.snapshot();
        for listener in &listeners {
            listener.on_progress(1.0);
        }
        for listener in &listeners {
            listener.on_failed(reason);
        }
        self.state.send_replace(SchedulingState::Failed);
        true
    }

    /// 等待进入终止状态
    pub async fn wait(&self) -> SchedulingState {
        let mut rx = self.subscribe();
        // 发送端由 self 持有，wait_for 不会因通道关闭而失败
        let state = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    fn claim_terminal(&self) -> bool {
        self.terminated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn snapshot(&self) -> Vec<Arc<dyn SchedulerListener>> {
        self.lock_listeners().clone()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn SchedulerListener>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventSupport {
    fn default() -> Self {
        Self::new()
    }
}
