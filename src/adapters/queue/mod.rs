pub mod redis_queue;
