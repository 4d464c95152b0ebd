//! 优雅退出管理模块
//!
//! 监听 SIGINT / SIGTERM（Windows 上为 Ctrl+C），把退出信号广播给 HTTP 服务与渲染服务。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info};

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户中断信号 (Ctrl+C)
    Interrupt,
    /// 终止信号 (SIGTERM)
    Terminate,
    /// 应用主动请求退出
    Application,
}

/// 优雅退出错误类型
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("信号设置失败: {0}")]
    SignalSetup(String),
}

#[derive(Debug)]
struct ShutdownInner {
    notify: Notify,
    reason: std::sync::Mutex<Option<ShutdownReason>>,
    shutting_down: AtomicBool,
}

/// 优雅退出管理器（克隆后共享同一状态）
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    inner: Arc<ShutdownInner>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                notify: Notify::new(),
                reason: std::sync::Mutex::new(None),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// 触发优雅退出；只有第一次调用生效
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        if self
            .inner
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("重复的退出信号被忽略: {:?}", reason);
            return;
        }

        info!("触发优雅退出: {:?}", reason);
        if let Ok(mut guard) = self.inner.reason.lock() {
            *guard = Some(reason);
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    fn last_reason(&self) -> ShutdownReason {
        self.inner
            .reason
            .lock()
            .ok()
            .and_then(|g| *g)
            .unwrap_or(ShutdownReason::Application)
    }

    /// 等待退出信号；已触发过时立即返回
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        // 先登记等待者再检查标志位，避免在两者之间错过通知
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.is_shutting_down() {
            debug!("等待退出信号...");
            notified.await;
        }
        self.last_reason()
    }

    /// 启动信号处理器
    pub fn start_signal_handler(&self) -> Result<(), ShutdownError> {
        #[cfg(unix)]
        {
            self.start_unix_signal_handler()
        }

        #[cfg(windows)]
        {
            self.start_windows_signal_handler()
        }
    }

    #[cfg(unix)]
    fn start_unix_signal_handler(&self) -> Result<(), ShutdownError> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("接收到SIGINT信号 (Ctrl+C)");
                    manager.trigger_shutdown(ShutdownReason::Interrupt);
                }
                _ = sigterm.recv() => {
                    info!("接收到SIGTERM信号");
                    manager.trigger_shutdown(ShutdownReason::Terminate);
                }
            }
        });

        info!("Unix 信号处理器已启动");
        Ok(())
    }

    #[cfg(windows)]
    fn start_windows_signal_handler(&self) -> Result<(), ShutdownError> {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("监听Ctrl+C信号失败: {}", e);
                return;
            }
            info!("接收到Ctrl+C信号");
            manager.trigger_shutdown(ShutdownReason::Interrupt);
        });

        info!("Windows 信号处理器已启动");
        Ok(())
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_then_wait_returns_immediately() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutting_down());

        manager.trigger_shutdown(ShutdownReason::Application);
        assert!(manager.is_shutting_down());
        assert_eq!(manager.wait_for_shutdown().await, ShutdownReason::Application);
    }

    #[tokio::test]
    async fn first_reason_wins() {
        let manager = ShutdownManager::new();
        manager.trigger_shutdown(ShutdownReason::Interrupt);
        manager.trigger_shutdown(ShutdownReason::Terminate);
        assert_eq!(manager.wait_for_shutdown().await, ShutdownReason::Interrupt);
    }

    #[tokio::test]
    async fn waiter_is_woken_by_later_trigger() {
        let manager = ShutdownManager::new();
        let waiter = {
            let m = manager.clone();
            tokio::spawn(async move { m.wait_for_shutdown().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.trigger_shutdown(ShutdownReason::Terminate);

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter timed out")
            .expect("join");
        assert_eq!(reason, ShutdownReason::Terminate);
    }

    #[tokio::test]
    async fn wait_blocks_until_triggered() {
        let manager = ShutdownManager::new();
        let waited =
            tokio::time::timeout(Duration::from_millis(50), manager.wait_for_shutdown()).await;
        assert!(waited.is_err());
    }
}
