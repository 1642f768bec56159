use invlink_catalog::CatalogError;
use invlink_codec::CodecError;
use invlink_protocol::TransportError;

/// 控制会话读路径错误。
///
/// 写路径不返回错误，而是返回带分类结果的 `ControlResult`。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}
