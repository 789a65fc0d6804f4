use tracing::trace;

/// 登録タスクのハンドル。キャンセルに使用する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

type OnceAction<C> = Box<dyn FnOnce(&mut C)>;
type RecurringAction<C> = Box<dyn FnMut(&mut C)>;
type Predicate<C> = Box<dyn Fn(&C) -> bool>;

enum TaskKind<C> {
    Once(OnceAction<C>),
    Recurring {
        interval: f64,
        predicate: Predicate<C>,
        action: RecurringAction<C>,
    },
}

struct Task<C> {
    handle: TaskHandle,
    due: f64,
    kind: TaskKind<C>,
}

/// 制御ループから毎ティックポーリングされる遅延・周期タスクのスケジューラ
///
/// - `schedule_once`: `delay` 秒後に一度だけ実行
/// - `schedule_recurring`: `interval` 秒ごとに、述語が真である限り実行。
///   期限到達時に述語が偽ならタスクは終了する
///
/// キャンセルはスケジューラからの削除であり、実行前に判定されます。
/// 実行中のタスクを中断することはありません。
pub struct Scheduler<C> {
    tasks: Vec<Task<C>>,
    next_handle: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_handle: 0,
        }
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_handle(&mut self) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// 一度だけ実行するタスクを登録
    pub fn schedule_once<F>(&mut self, now: f64, delay: f64, action: F) -> TaskHandle
    where
        F: FnOnce(&mut C) + 'static,
    {
        let handle = self.allocate_handle();
        self.tasks.push(Task {
            handle,
            due: now + delay.max(0.0),
            kind: TaskKind::Once(Box::new(action)),
        });
        handle
    }

    /// 周期タスクを登録。初回実行は `interval` 秒後
    pub fn schedule_recurring<P, F>(
        &mut self,
        now: f64,
        interval: f64,
        predicate: P,
        action: F,
    ) -> TaskHandle
    where
        P: Fn(&C) -> bool + 'static,
        F: FnMut(&mut C) + 'static,
    {
        let handle = self.allocate_handle();
        self.tasks.push(Task {
            handle,
            due: now + interval.max(0.0),
            kind: TaskKind::Recurring {
                interval: interval.max(0.0),
                predicate: Box::new(predicate),
                action: Box::new(action),
            },
        });
        handle
    }

    /// タスクを削除。まだ登録されていた場合は true
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.handle != handle);
        before != self.tasks.len()
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// 期限に達したタスクを登録順に実行し、実行数を返す
    pub fn poll(&mut self, now: f64, context: &mut C) -> usize {
        let mut fired = 0;
        let mut remaining = Vec::with_capacity(self.tasks.len());

        for task in std::mem::take(&mut self.tasks) {
            if task.due > now {
                remaining.push(task);
                continue;
            }

            match task.kind {
                TaskKind::Once(action) => {
                    trace!(handle = task.handle.0, now, "TASK_FIRED: 遅延タスクを実行");
                    action(context);
                    fired += 1;
                }
                TaskKind::Recurring {
                    interval,
                    predicate,
                    mut action,
                } => {
                    if !predicate(context) {
                        trace!(handle = task.handle.0, now, "TASK_FINISHED: 周期タスクが終了条件に達しました");
                        continue;
                    }
                    trace!(handle = task.handle.0, now, "TASK_FIRED: 周期タスクを実行");
                    action(context);
                    fired += 1;
                    remaining.push(Task {
                        handle: task.handle,
                        due: now + interval,
                        kind: TaskKind::Recurring {
                            interval,
                            predicate,
                            action,
                        },
                    });
                }
            }
        }

        self.tasks = remaining;
        fired
    }
}

/// 単調時刻に基づくレート制限
///
/// 初回の `ready` は即座に真となり、以降は前回発火から `interval` 秒経過するまで偽を返します。
#[derive(Debug, Clone, PartialEq)]
pub struct Cooldown {
    interval: f64,
    last_fired: Option<f64>,
}

impl Cooldown {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// 発火可能なら発火時刻を記録して true を返す
    pub fn ready(&mut self, now: f64) -> bool {
        match self.last_fired {
            Some(last) if now - last < self.interval => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}
