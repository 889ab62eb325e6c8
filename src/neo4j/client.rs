//! Neo4j client for the CRM entity store.
//!
//! Each entity is a labelled node holding its JSON document in `doc`, plus the
//! handful of scalar properties that queries filter on (`id`, `owner_id`,
//! `org_id`, `opp_id`, ...). Reads deserialize `doc` back into the model.

use super::models::*;
use anyhow::{Context, Result};
use neo4rs::{query, Graph, Query};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Client for Neo4j operations
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

fn to_doc<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize document")
}

/// Builder for parameterized WHERE clauses over a single node alias
struct WhereBuilder {
    alias: &'static str,
    conditions: Vec<String>,
    params: Vec<(String, String)>,
}

impl WhereBuilder {
    fn new(alias: &'static str) -> Self {
        Self {
            alias,
            conditions: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Add an equality filter on `alias.field` when `value` is set
    fn eq(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.conditions
                .push(format!("{}.{} = ${}", self.alias, field, field));
            self.params.push((field.to_string(), value.to_string()));
        }
        self
    }

    fn build_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn bind(&self, mut q: Query) -> Query {
        for (key, value) in &self.params {
            q = q.param(key, value.clone());
        }
        q
    }
}

impl Neo4jClient {
    /// Create a new Neo4j client
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;

        let client = Self {
            graph: Arc::new(graph),
        };

        client.init_schema().await?;

        Ok(client)
    }

    /// Initialize constraints and lookup indexes
    async fn init_schema(&self) -> Result<()> {
        let constraints = vec![
            "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
            "CREATE CONSTRAINT user_email IF NOT EXISTS FOR (u:User) REQUIRE u.email IS UNIQUE",
            "CREATE CONSTRAINT organization_id IF NOT EXISTS FOR (o:Organization) REQUIRE o.id IS UNIQUE",
            "CREATE CONSTRAINT contact_id IF NOT EXISTS FOR (c:Contact) REQUIRE c.id IS UNIQUE",
            "CREATE CONSTRAINT opportunity_id IF NOT EXISTS FOR (o:Opportunity) REQUIRE o.id IS UNIQUE",
            "CREATE CONSTRAINT activity_id IF NOT EXISTS FOR (a:Activity) REQUIRE a.id IS UNIQUE",
            "CREATE CONSTRAINT pipeline_id IF NOT EXISTS FOR (p:Pipeline) REQUIRE p.id IS UNIQUE",
            "CREATE CONSTRAINT stage_id IF NOT EXISTS FOR (s:Stage) REQUIRE s.id IS UNIQUE",
        ];

        let indexes = vec![
            "CREATE INDEX contact_org IF NOT EXISTS FOR (c:Contact) ON (c.org_id)",
            "CREATE INDEX opportunity_owner IF NOT EXISTS FOR (o:Opportunity) ON (o.owner_id)",
            "CREATE INDEX opportunity_pipeline IF NOT EXISTS FOR (o:Opportunity) ON (o.pipeline_id)",
            "CREATE INDEX opportunity_org IF NOT EXISTS FOR (o:Opportunity) ON (o.org_id)",
            "CREATE INDEX activity_opp IF NOT EXISTS FOR (a:Activity) ON (a.opp_id)",
            "CREATE INDEX activity_org IF NOT EXISTS FOR (a:Activity) ON (a.org_id)",
            "CREATE INDEX activity_owner IF NOT EXISTS FOR (a:Activity) ON (a.owner_id)",
            "CREATE INDEX stage_pipeline IF NOT EXISTS FOR (s:Stage) ON (s.pipeline_id)",
        ];

        for constraint in constraints {
            if let Err(e) = self.graph.run(query(constraint)).await {
                tracing::warn!("Constraint may already exist: {}", e);
            }
        }

        for index in indexes {
            if let Err(e) = self.graph.run(query(index)).await {
                tracing::warn!("Index may already exist: {}", e);
            }
        }

        Ok(())
    }

    /// Check connectivity
    pub async fn health_check(&self) -> Result<bool> {
        let mut result = self.graph.execute(query("RETURN 1 AS ok")).await?;
        Ok(result.next().await?.is_some())
    }

    // ========================================================================
    // Document helpers
    // ========================================================================

    /// Run a query whose rows carry a `doc` column and deserialize each one
    async fn fetch_docs<T: DeserializeOwned>(&self, q: Query) -> Result<Vec<T>> {
        let mut result = self.graph.execute(q).await?;
        let mut docs = Vec::new();
        while let Some(row) = result.next().await? {
            let doc: String = row.get("doc")?;
            docs.push(serde_json::from_str(&doc).context("Corrupt document in store")?);
        }
        Ok(docs)
    }

    async fn fetch_doc<T: DeserializeOwned>(&self, q: Query) -> Result<Option<T>> {
        Ok(self.fetch_docs(q).await?.into_iter().next())
    }

    async fn get_by_id<T: DeserializeOwned>(&self, label: &str, id: &str) -> Result<Option<T>> {
        let cypher = format!("MATCH (n:{} {{id: $id}}) RETURN n.doc AS doc", label);
        self.fetch_doc(query(&cypher).param("id", id)).await
    }

    async fn list_all<T: DeserializeOwned>(&self, label: &str) -> Result<Vec<T>> {
        let cypher = format!(
            "MATCH (n:{}) RETURN n.doc AS doc ORDER BY n.created_at",
            label
        );
        self.fetch_docs(query(&cypher)).await
    }

    async fn delete_by_id(&self, label: &str, id: &str) -> Result<bool> {
        let cypher = format!(
            "MATCH (n:{} {{id: $id}}) DETACH DELETE n RETURN count(*) AS deleted",
            label
        );
        let mut result = self.graph.execute(query(&cypher).param("id", id)).await?;
        let deleted = match result.next().await? {
            Some(row) => row.get::<i64>("deleted")?,
            None => 0,
        };
        Ok(deleted > 0)
    }

    // ========================================================================
    // User operations
    // ========================================================================

    /// Create or replace a user
    pub async fn upsert_user(&self, user: &UserNode) -> Result<()> {
        let q = query(
            r#"
            MERGE (u:User {id: $id})
            SET u.doc = $doc,
                u.email = $email,
                u.created_at = $created_at
            "#,
        )
        .param("id", user.user_id.clone())
        .param("doc", to_doc(user)?)
        .param("email", user.email.clone())
        .param("created_at", user.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserNode>> {
        self.get_by_id("User", user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserNode>> {
        let q = query("MATCH (u:User {email: $email}) RETURN u.doc AS doc").param("email", email);
        self.fetch_doc(q).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserNode>> {
        self.list_all("User").await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.delete_by_id("User", user_id).await
    }

    // ========================================================================
    // Organization operations
    // ========================================================================

    pub async fn upsert_organization(&self, org: &OrganizationNode) -> Result<()> {
        let q = query(
            r#"
            MERGE (o:Organization {id: $id})
            SET o.doc = $doc,
                o.owner_id = $owner_id,
                o.created_at = $created_at
            "#,
        )
        .param("id", org.org_id.clone())
        .param("doc", to_doc(org)?)
        .param("owner_id", org.owner_id.clone())
        .param("created_at", org.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn get_organization(&self, org_id: &str) -> Result<Option<OrganizationNode>> {
        self.get_by_id("Organization", org_id).await
    }

    pub async fn list_organizations(&self) -> Result<Vec<OrganizationNode>> {
        self.list_all("Organization").await
    }

    pub async fn delete_organization(&self, org_id: &str) -> Result<bool> {
        self.delete_by_id("Organization", org_id).await
    }

    // ========================================================================
    // Contact operations
    // ========================================================================

    pub async fn upsert_contact(&self, contact: &ContactNode) -> Result<()> {
        let q = query(
            r#"
            MERGE (c:Contact {id: $id})
            SET c.doc = $doc,
                c.org_id = $org_id,
                c.owner_id = $owner_id,
                c.created_at = $created_at
            "#,
        )
        .param("id", contact.contact_id.clone())
        .param("doc", to_doc(contact)?)
        .param("org_id", contact.org_id.clone())
        .param("owner_id", contact.owner_id.clone())
        .param("created_at", contact.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn get_contact(&self, contact_id: &str) -> Result<Option<ContactNode>> {
        self.get_by_id("Contact", contact_id).await
    }

    pub async fn list_contacts(&self, org_id: Option<&str>) -> Result<Vec<ContactNode>> {
        let mut wb = WhereBuilder::new("c");
        wb.eq("org_id", org_id);
        let cypher = format!(
            "MATCH (c:Contact) {} RETURN c.doc AS doc ORDER BY c.created_at",
            wb.build_clause()
        );
        self.fetch_docs(wb.bind(query(&cypher))).await
    }

    pub async fn delete_contact(&self, contact_id: &str) -> Result<bool> {
        self.delete_by_id("Contact", contact_id).await
    }

    // ========================================================================
    // Opportunity operations
    // ========================================================================

    pub async fn create_opportunity(&self, opp: &OpportunityNode) -> Result<()> {
        let q = query(
            r#"
            CREATE (o:Opportunity {
                id: $id,
                doc: $doc,
                version: $version,
                org_id: $org_id,
                owner_id: $owner_id,
                pipeline_id: $pipeline_id,
                created_at: $created_at
            })
            "#,
        )
        .param("id", opp.opp_id.clone())
        .param("doc", to_doc(opp)?)
        .param("version", opp.version as i64)
        .param("org_id", opp.org_id.clone())
        .param("owner_id", opp.owner_id.clone())
        .param("pipeline_id", opp.pipeline_id.clone())
        .param("created_at", opp.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn get_opportunity(&self, opp_id: &str) -> Result<Option<OpportunityNode>> {
        self.get_by_id("Opportunity", opp_id).await
    }

    pub async fn list_opportunities(
        &self,
        filter: &OpportunityFilter,
    ) -> Result<Vec<OpportunityNode>> {
        let mut wb = WhereBuilder::new("o");
        wb.eq("pipeline_id", filter.pipeline_id.as_deref())
            .eq("owner_id", filter.owner_id.as_deref())
            .eq("org_id", filter.org_id.as_deref());
        let cypher = format!(
            "MATCH (o:Opportunity) {} RETURN o.doc AS doc ORDER BY o.created_at",
            wb.build_clause()
        );
        self.fetch_docs(wb.bind(query(&cypher))).await
    }

    /// Compare-and-set write keyed on the stored `version` property
    pub async fn update_opportunity(
        &self,
        opp: &OpportunityNode,
        expected_version: u64,
    ) -> Result<bool> {
        let mut stored = opp.clone();
        stored.version = expected_version + 1;

        let q = query(
            r#"
            MATCH (o:Opportunity {id: $id})
            WHERE o.version = $expected
            SET o.doc = $doc,
                o.version = $next,
                o.org_id = $org_id,
                o.owner_id = $owner_id,
                o.pipeline_id = $pipeline_id
            RETURN o.id AS id
            "#,
        )
        .param("id", stored.opp_id.clone())
        .param("expected", expected_version as i64)
        .param("next", stored.version as i64)
        .param("doc", to_doc(&stored)?)
        .param("org_id", stored.org_id.clone())
        .param("owner_id", stored.owner_id.clone())
        .param("pipeline_id", stored.pipeline_id.clone());

        let mut result = self.graph.execute(q).await?;
        Ok(result.next().await?.is_some())
    }

    /// Delete an opportunity and all activities that reference it
    pub async fn delete_opportunity(&self, opp_id: &str) -> Result<bool> {
        let q = query("MATCH (a:Activity {opp_id: $opp_id}) DETACH DELETE a")
            .param("opp_id", opp_id);
        self.graph.run(q).await?;

        self.delete_by_id("Opportunity", opp_id).await
    }

    // ========================================================================
    // Activity operations
    // ========================================================================

    pub async fn upsert_activity(&self, activity: &ActivityNode) -> Result<()> {
        let q = query(
            r#"
            MERGE (a:Activity {id: $id})
            SET a.doc = $doc,
                a.opp_id = $opp_id,
                a.org_id = $org_id,
                a.owner_id = $owner_id,
                a.status = $status,
                a.created_at = $created_at
            "#,
        )
        .param("id", activity.activity_id.clone())
        .param("doc", to_doc(activity)?)
        .param("opp_id", activity.opp_id.clone().unwrap_or_default())
        .param("org_id", activity.org_id.clone().unwrap_or_default())
        .param("owner_id", activity.owner_id.clone())
        .param("status", format!("{:?}", activity.status))
        .param("created_at", activity.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn get_activity(&self, activity_id: &str) -> Result<Option<ActivityNode>> {
        self.get_by_id("Activity", activity_id).await
    }

    pub async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityNode>> {
        let status = filter.status.map(|s| format!("{:?}", s));
        let mut wb = WhereBuilder::new("a");
        wb.eq("opp_id", filter.opp_id.as_deref())
            .eq("org_id", filter.org_id.as_deref())
            .eq("owner_id", filter.owner_id.as_deref())
            .eq("status", status.as_deref());
        let cypher = format!(
            "MATCH (a:Activity) {} RETURN a.doc AS doc ORDER BY a.created_at",
            wb.build_clause()
        );
        self.fetch_docs(wb.bind(query(&cypher))).await
    }

    pub async fn delete_activity(&self, activity_id: &str) -> Result<bool> {
        self.delete_by_id("Activity", activity_id).await
    }

    // ========================================================================
    // Pipeline & stage operations
    // ========================================================================

    /// The `is_default` flag lives on the node property so that
    /// `set_default_pipeline` can flip it for every pipeline in one statement.
    async fn fetch_pipelines(&self, q: Query) -> Result<Vec<PipelineNode>> {
        let mut result = self.graph.execute(q).await?;
        let mut pipelines = Vec::new();
        while let Some(row) = result.next().await? {
            let doc: String = row.get("doc")?;
            let mut pipeline: PipelineNode =
                serde_json::from_str(&doc).context("Corrupt pipeline document")?;
            pipeline.is_default = row.get::<bool>("is_default").unwrap_or(false);
            pipelines.push(pipeline);
        }
        Ok(pipelines)
    }

    pub async fn upsert_pipeline(&self, pipeline: &PipelineNode) -> Result<()> {
        let q = query(
            r#"
            MERGE (p:Pipeline {id: $id})
            SET p.doc = $doc,
                p.is_default = $is_default,
                p.created_at = $created_at
            "#,
        )
        .param("id", pipeline.pipeline_id.clone())
        .param("doc", to_doc(pipeline)?)
        .param("is_default", pipeline.is_default)
        .param("created_at", pipeline.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn get_pipeline(&self, pipeline_id: &str) -> Result<Option<PipelineNode>> {
        let q = query(
            "MATCH (p:Pipeline {id: $id}) RETURN p.doc AS doc, p.is_default AS is_default",
        )
        .param("id", pipeline_id);
        Ok(self.fetch_pipelines(q).await?.into_iter().next())
    }

    pub async fn list_pipelines(&self) -> Result<Vec<PipelineNode>> {
        let q = query(
            "MATCH (p:Pipeline) RETURN p.doc AS doc, p.is_default AS is_default ORDER BY p.created_at",
        );
        self.fetch_pipelines(q).await
    }

    pub async fn set_default_pipeline(&self, pipeline_id: &str) -> Result<()> {
        let q = query("MATCH (p:Pipeline) SET p.is_default = (p.id = $id)")
            .param("id", pipeline_id);
        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn upsert_stage(&self, stage: &StageNode) -> Result<()> {
        let q = query(
            r#"
            MERGE (s:Stage {id: $id})
            SET s.doc = $doc,
                s.pipeline_id = $pipeline_id,
                s.order = $order
            "#,
        )
        .param("id", stage.stage_id.clone())
        .param("doc", to_doc(stage)?)
        .param("pipeline_id", stage.pipeline_id.clone())
        .param("order", i64::from(stage.order));

        self.graph.run(q).await?;
        Ok(())
    }

    pub async fn get_stage(&self, stage_id: &str) -> Result<Option<StageNode>> {
        self.get_by_id("Stage", stage_id).await
    }

    pub async fn list_stages(&self, pipeline_id: Option<&str>) -> Result<Vec<StageNode>> {
        let mut wb = WhereBuilder::new("s");
        wb.eq("pipeline_id", pipeline_id);
        let cypher = format!(
            "MATCH (s:Stage) {} RETURN s.doc AS doc ORDER BY s.order ASC",
            wb.build_clause()
        );
        self.fetch_docs(wb.bind(query(&cypher))).await
    }
}
