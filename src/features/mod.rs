/// 健康检查
pub mod health;
/// 赛博朋克卡片渲染引擎与上传接口
pub mod image;
