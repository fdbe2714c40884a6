//! 고정 용량 큐
//!
//! 스테이지 사이를 잇는 다중 생산자/다중 소비자 FIFO.
//! 송신은 소유권 이동이며, 큐가 가득 차면 정책에 따라 블록하거나 실패한다.

use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, TrySendError};

use crate::{Error, Result};

/// 송신 측 핸들
#[derive(Debug)]
pub struct QueueTx<T> {
    inner: crossbeam_channel::Sender<T>,
}

impl<T> Clone for QueueTx<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// 수신 측 핸들
#[derive(Debug)]
pub struct QueueRx<T> {
    inner: crossbeam_channel::Receiver<T>,
}

impl<T> Clone for QueueRx<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// 용량 `capacity`의 큐 생성
pub fn bounded<T>(capacity: usize) -> (QueueTx<T>, QueueRx<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (QueueTx { inner: tx }, QueueRx { inner: rx })
}

impl<T> QueueTx<T> {
    /// 공간이 생길 때까지 블록
    pub fn send(&self, item: T) -> Result<()> {
        self.inner.send(item).map_err(|_| Error::QueueDisconnected)
    }

    /// 최대 `timeout`까지 대기, 실패 시 항목을 돌려준다
    pub fn send_timeout(
        &self,
        item: T,
        timeout: Duration,
    ) -> std::result::Result<(), (T, Error)> {
        self.inner.send_timeout(item, timeout).map_err(|e| match e {
            SendTimeoutError::Timeout(item) => (item, Error::QueueTimeout),
            SendTimeoutError::Disconnected(item) => (item, Error::QueueDisconnected),
        })
    }

    /// 대기 없이 송신
    pub fn try_send(&self, item: T) -> std::result::Result<(), (T, Error)> {
        self.inner.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => (item, Error::QueueFull),
            TrySendError::Disconnected(item) => (item, Error::QueueDisconnected),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().unwrap_or(usize::MAX)
    }
}

impl<T> QueueRx<T> {
    /// 항목이 올 때까지 블록
    pub fn recv(&self) -> Result<T> {
        self.inner.recv().map_err(|_| Error::QueueDisconnected)
    }

    /// 최대 `timeout`까지 대기
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T> {
        self.inner.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => Error::QueueTimeout,
            RecvTimeoutError::Disconnected => Error::QueueDisconnected,
        })
    }

    /// 현재 쌓인 항목 모두 꺼내기
    pub fn drain(&self) -> Vec<T> {
        self.inner.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
