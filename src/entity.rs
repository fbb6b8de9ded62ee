use serde_json::Value;

use crate::config::EntityLocator;
use crate::exchange::Exchange;
use crate::Result;

/// Look up the subject entity of an exchange.
///
/// A path that leads nowhere yields `Value::Null`: the entity is then
/// anonymous, which only the fallback strategy can serve.
pub async fn resolve_entity(
    locator: &EntityLocator,
    exchange: &dyn Exchange,
) -> Result<Value> {
    match locator {
        EntityLocator::Path(path) => {
            match path.resolve(exchange.context()) {
                Some(entity) => Ok(entity.clone()),
                None => {
                    log::debug!("no entity found at {}", path);
                    Ok(Value::Null)
                }
            }
        }
        EntityLocator::Function(f) => f(exchange).await,
    }
}
