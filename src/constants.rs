/// 阅读事件限流窗口（秒）
pub const DEFAULT_READ_LIMIT_WINDOW_SECS: u64 = 30;

/// 每个窗口内同一 (IP, 读者, 文章) 允许记录的次数
pub const DEFAULT_READ_LIMIT_MAX: u64 = 1;

/// 无法识别读者时使用的占位 actor
pub const GUEST_ACTOR: &str = "guest";

/// 无法识别客户端 IP 时使用的占位地址
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// 聚合任务最大执行次数（含首次）
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 指数退避基数（毫秒）
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 2_000;

/// 聚合 worker 数量
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;

/// 单个聚合任务处理超时（秒）
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 30;

/// 每日汇总：UTC 00:05（秒 分 时 日 月 周）
pub const DEFAULT_DAILY_ROLLUP_CRON: &str = "0 5 0 * * *";

/// 阅读记录通道容量
pub const DEFAULT_RECORDER_CAPACITY: usize = 1024;

/// 单篇文章分析接口返回的日历天数（含今天）
pub const MAX_ANALYTICS_DAYS: u64 = 366;

/// 作者看板默认每页条数
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// 作者看板每页上限
pub const MAX_PAGE_SIZE: u64 = 100;
