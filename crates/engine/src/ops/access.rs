use sea_orm::{ActiveValue, QueryOrder, prelude::*, sea_query::OnConflict};
use uuid::Uuid;

use crate::{Actor, ActorContext, EngineError, ResultEngine, Role, actors, util::normalize_name};

use super::Engine;

impl Engine {
    /// Turn a caller-supplied actor id into a verified context.
    ///
    /// Unknown ids are `Unauthorized`, never `KeyNotFound`: the caller only
    /// learns that the identity is not accepted.
    pub async fn resolve_actor(&self, actor_id: Uuid) -> ResultEngine<ActorContext> {
        let model = actors::Entity::find_by_id(actor_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::Unauthorized(format!("unknown actor {actor_id}")))?;
        let actor = Actor::try_from(model)?;
        Ok(ActorContext::new(actor.id, actor.role))
    }

    pub async fn actor(&self, actor_id: Uuid) -> ResultEngine<Actor> {
        actors::Entity::find_by_id(actor_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("actor {actor_id}")))?
            .try_into()
    }

    pub async fn list_actors(&self) -> ResultEngine<Vec<Actor>> {
        actors::Entity::find()
            .order_by_asc(actors::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Actor::try_from)
            .collect()
    }

    /// Mirror an identity issued by the auth collaborator. Re-running with the
    /// same id updates name and role.
    pub async fn upsert_actor(&self, id: Uuid, name: &str, role: Role) -> ResultEngine<Actor> {
        let name = normalize_name(name)
            .ok_or_else(|| EngineError::InvalidId("actor name must not be empty".to_string()))?;
        let model = actors::ActiveModel {
            id: ActiveValue::Set(id),
            name: ActiveValue::Set(name.clone()),
            role: ActiveValue::Set(role.as_str().to_string()),
        };
        actors::Entity::insert(model)
            .on_conflict(
                OnConflict::column(actors::Column::Id)
                    .update_columns([actors::Column::Name, actors::Column::Role])
                    .to_owned(),
            )
            .exec_without_returning(&self.database)
            .await?;
        Ok(Actor { id, name, role })
    }
}

pub(super) fn require_admin(ctx: &ActorContext, action: &str) -> ResultEngine<()> {
    if !ctx.role().is_admin() {
        return Err(EngineError::Unauthorized(format!(
            "only admins can {action}"
        )));
    }
    Ok(())
}
