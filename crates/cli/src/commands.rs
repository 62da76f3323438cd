//! Command execution. Every command returns the JSON document to print.

use serde_json::{json, Value};

use shelfwise_auth::{Principal, Role};
use shelfwise_catalog::{
    BusinessChanges, BusinessDraft, CollectionChanges, CollectionDraft, ItemChanges, ItemDraft,
    ParentRef, UserDraft,
};
use shelfwise_core::{BusinessId, CollectionId, ItemId, UserId};
use shelfwise_infra::CatalogStore;

use crate::app::App;
use crate::args::{
    BusinessCommands, Cli, CollectionCommands, Commands, ItemCommands, UserCommands,
};

pub async fn execute<S>(app: &App<S>, cli: &Cli) -> anyhow::Result<Value>
where
    S: CatalogStore + Clone,
{
    let acting = match cli.acting_user {
        Some(id) => Some(app.users.principal(UserId::new(id)).await?),
        None => None,
    };

    match &cli.command {
        Commands::Migrate => Ok(json!({ "migrated": true })),
        Commands::Business { command } => business(app, acting.as_ref(), command).await,
        Commands::Collection { command } => collection(app, acting.as_ref(), command).await,
        Commands::Item { command } => item(app, acting.as_ref(), command).await,
        Commands::User { command } => user(app, command).await,
    }
}

/// Role and memberships used for listings. Without an acting user the
/// operator sees everything.
fn scope(acting: Option<&Principal>) -> (Role, Vec<BusinessId>) {
    match acting {
        Some(principal) => (principal.role.clone(), principal.business_ids.clone()),
        None => (Role::ADMIN, Vec::new()),
    }
}

/// `Some(Some(v))` to set, `Some(None)` to clear, `None` to leave untouched.
fn nullable(value: &Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.clone().map(Some)
    }
}

async fn business<S>(
    app: &App<S>,
    acting: Option<&Principal>,
    command: &BusinessCommands,
) -> anyhow::Result<Value>
where
    S: CatalogStore + Clone,
{
    let value = match command {
        BusinessCommands::Create {
            name,
            logo,
            address,
            owner,
        } => {
            let draft = BusinessDraft {
                name: name.clone(),
                logo: logo.clone(),
                address: address.clone(),
            };
            let business = match owner {
                Some(owner) => {
                    app.businesses
                        .register_for_user(UserId::new(*owner), draft)
                        .await?
                }
                None => app.businesses.create(draft).await?,
            };
            serde_json::to_value(business)?
        }
        BusinessCommands::Show { id } => {
            serde_json::to_value(app.businesses.get(BusinessId::new(*id)).await?)?
        }
        BusinessCommands::Update {
            id,
            name,
            logo,
            clear_logo,
            address,
            clear_address,
        } => {
            let id = BusinessId::new(*id);
            let changes = BusinessChanges {
                name: name.clone(),
                logo: nullable(logo, *clear_logo),
                address: nullable(address, *clear_address),
            };
            let business = match acting {
                Some(principal) => app.businesses.update_as_member(principal, id, changes).await?,
                None => app.businesses.update(id, changes).await?,
            };
            serde_json::to_value(business)?
        }
        BusinessCommands::Delete { id } => {
            serde_json::to_value(app.businesses.delete(BusinessId::new(*id)).await?)?
        }
        BusinessCommands::List => {
            let (role, ids) = scope(acting);
            serde_json::to_value(app.businesses.list_for_tenant(&role, &ids).await?)?
        }
        BusinessCommands::Join {
            user_id,
            business_id,
        } => {
            let joined = app
                .businesses
                .join(UserId::new(*user_id), BusinessId::new(*business_id))
                .await?;
            json!({ "joined": joined })
        }
        BusinessCommands::Leave {
            user_id,
            business_id,
        } => {
            let left = app
                .businesses
                .leave(UserId::new(*user_id), BusinessId::new(*business_id))
                .await?;
            json!({ "left": left })
        }
    };
    Ok(value)
}

async fn collection<S>(
    app: &App<S>,
    acting: Option<&Principal>,
    command: &CollectionCommands,
) -> anyhow::Result<Value>
where
    S: CatalogStore + Clone,
{
    let value = match command {
        CollectionCommands::Create {
            business_id,
            name,
            description,
            parent,
            inactive,
        } => {
            let mut draft = CollectionDraft::new(BusinessId::new(*business_id), name.clone())
                .with_parent(ParentRef::parse(parent.as_deref()));
            draft.description = description.clone();
            if *inactive {
                draft = draft.inactive();
            }
            serde_json::to_value(app.collections.create(draft).await?)?
        }
        CollectionCommands::Show { id } => {
            serde_json::to_value(app.collections.get(CollectionId::new(*id)).await?)?
        }
        CollectionCommands::Update {
            id,
            business,
            name,
            description,
            clear_description,
            parent,
            clear_parent,
            active,
        } => {
            let changes = CollectionChanges {
                business_id: business.map(BusinessId::new),
                name: name.clone(),
                description: nullable(description, *clear_description),
                parent_id: if *clear_parent {
                    Some(None)
                } else {
                    parent.map(|p| Some(CollectionId::new(p)))
                },
                active: *active,
            };
            serde_json::to_value(app.collections.update(CollectionId::new(*id), changes).await?)?
        }
        CollectionCommands::Delete { id } => {
            serde_json::to_value(app.collections.delete(CollectionId::new(*id)).await?)?
        }
        CollectionCommands::List { tree } => {
            if *tree {
                let (role, ids) = scope(acting);
                serde_json::to_value(app.collections.forest_for_tenant(&role, &ids).await?)?
            } else if let Some(principal) = acting {
                serde_json::to_value(app.collections.list_for_principal(principal).await?)?
            } else {
                serde_json::to_value(app.collections.list_for_tenant(&Role::ADMIN, &[]).await?)?
            }
        }
        CollectionCommands::Active { business_id } => serde_json::to_value(
            app.collections
                .active_for_business(BusinessId::new(*business_id))
                .await?,
        )?,
        CollectionCommands::Parents => {
            let parents: Vec<_> = app.collections.predefined().iter().collect();
            serde_json::to_value(parents)?
        }
    };
    Ok(value)
}

async fn item<S>(
    app: &App<S>,
    acting: Option<&Principal>,
    command: &ItemCommands,
) -> anyhow::Result<Value>
where
    S: CatalogStore + Clone,
{
    let value = match command {
        ItemCommands::Create {
            business_id,
            collection_id,
            title,
            introduction,
            description,
            image,
            inactive,
        } => {
            let mut draft = ItemDraft::new(
                BusinessId::new(*business_id),
                CollectionId::new(*collection_id),
                title.clone(),
            );
            draft.introduction = introduction.clone();
            draft.description = description.clone();
            draft.image_path = image.clone();
            draft.active = !*inactive;
            serde_json::to_value(app.items.create(draft).await?)?
        }
        ItemCommands::Show { id } => serde_json::to_value(app.items.get(ItemId::new(*id)).await?)?,
        ItemCommands::Update {
            id,
            business,
            collection,
            title,
            introduction,
            clear_introduction,
            description,
            clear_description,
            image,
            clear_image,
            active,
        } => {
            let changes = ItemChanges {
                business_id: business.map(BusinessId::new),
                collection_id: collection.map(CollectionId::new),
                title: title.clone(),
                introduction: nullable(introduction, *clear_introduction),
                description: nullable(description, *clear_description),
                image_path: nullable(image, *clear_image),
                active: *active,
            };
            serde_json::to_value(app.items.update(ItemId::new(*id), changes).await?)?
        }
        ItemCommands::Delete { id } => {
            serde_json::to_value(app.items.delete(ItemId::new(*id)).await?)?
        }
        ItemCommands::List => {
            let (role, ids) = scope(acting);
            serde_json::to_value(app.items.list_for_tenant(&role, &ids).await?)?
        }
    };
    Ok(value)
}

async fn user<S>(app: &App<S>, command: &UserCommands) -> anyhow::Result<Value>
where
    S: CatalogStore + Clone,
{
    let value = match command {
        UserCommands::Create { name, email, role } => {
            let role: Role = role.parse()?;
            let draft = UserDraft::new(name.clone(), email.clone(), role);
            serde_json::to_value(app.users.create_user(draft).await?)?
        }
        UserCommands::Show { id } => {
            serde_json::to_value(app.users.get_user(UserId::new(*id)).await?)?
        }
        UserCommands::List => serde_json::to_value(app.users.list_users().await?)?,
    };
    Ok(value)
}
