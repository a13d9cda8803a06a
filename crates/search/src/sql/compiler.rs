//! Whole-tree compilation.
//!
//! [`SqlSearchCompiler`] turns a search expression tree for one resource type
//! into a single `SELECT` over `Resource`. Every search parameter scope becomes
//! an `EXISTS` subquery against the parameter's table, joined back on
//! `ResourceSurrogateId` and filtered by the parameter's `SearchParamId`.
//! Field-level nodes inside a scope are rendered by the parameter kind's
//! generator.
//!
//! Results are ordered by `ResourceSurrogateId`; the continuation cursor is
//! the last surrogate id of the previous page. One extra row is requested so
//! the caller can tell whether another page exists.

use tracing::debug;

use crate::catalog::{KeyNamespace, SurrogateKeyLookup};
use crate::error::{GenerationResult, QueryGenerationError};
use crate::expressions::{ChainedExpression, Expression, FieldName, ParameterRef};
use crate::types::ParameterKind;

use super::context::{CompiledQuery, QueryContext};
use super::generators::{
    ResourceTableQueryGenerator, SearchParameterQueryGenerator, generator_for,
};
use super::schema::{ReferenceSearchParamTable, ResourceTable, SearchParamTable};

/// Page window of a compiled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Number of entries in the page.
    pub page_size: u32,
    /// Surrogate id of the last entry on the previous page.
    pub after: Option<i64>,
}

impl PageRequest {
    /// First page of the given size.
    pub fn first(page_size: u32) -> Self {
        Self {
            page_size,
            after: None,
        }
    }

    /// Page following the entry with surrogate id `after`.
    pub fn after(page_size: u32, after: i64) -> Self {
        Self {
            page_size,
            after: Some(after),
        }
    }

    /// Resumes from a continuation token. Tokens that do not parse start
    /// from the first page.
    pub fn from_continuation(page_size: u32, token: Option<&str>) -> Self {
        Self {
            page_size,
            after: token.and_then(|t| t.parse().ok()),
        }
    }

    /// Rows to request: one more than the page size.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size) + 1
    }
}

/// Columns selected for every matching resource, in order.
pub const SELECTED_COLUMNS: [&str; 6] = [
    "ResourceSurrogateId",
    "ResourceId",
    "Version",
    "LastUpdated",
    "RequestMethod",
    "RawResource",
];

/// Where a field-level node is being rendered.
#[derive(Clone, Copy)]
enum Scope<'s> {
    /// Directly on a resource row.
    Resource { alias: &'s str },
    /// Inside a search parameter's `EXISTS` subquery.
    Parameter {
        resource_alias: &'s str,
        generator: &'static dyn SearchParameterQueryGenerator,
        composite: bool,
    },
}

impl<'s> Scope<'s> {
    fn resource_alias(&self) -> &'s str {
        match self {
            Scope::Resource { alias } => alias,
            Scope::Parameter { resource_alias, .. } => resource_alias,
        }
    }
}

/// Compiles expression trees into SQL.
pub struct SqlSearchCompiler<'a> {
    catalog: &'a dyn SurrogateKeyLookup,
}

impl<'a> SqlSearchCompiler<'a> {
    /// Creates a compiler that normalizes through `catalog`.
    pub fn new(catalog: &'a dyn SurrogateKeyLookup) -> Self {
        Self { catalog }
    }

    /// Compiles a search over `resource_type`.
    ///
    /// `expression` may be `None` for an unfiltered search.
    pub fn compile(
        &self,
        resource_type: &str,
        expression: Option<&Expression>,
        page: PageRequest,
    ) -> GenerationResult<CompiledQuery> {
        let (ctx, root) = QueryContext::new(self.catalog).next_alias("r");

        let mut ctx = ctx.append("SELECT ");
        for (i, column) in SELECTED_COLUMNS.iter().enumerate() {
            if i > 0 {
                ctx = ctx.append(", ");
            }
            ctx = ctx.append(&root).append(".").append(column);
        }
        let ctx = ctx.append(" FROM Resource ").append(&root).append(" WHERE ");
        let ctx = self.live_resource_of_type(ctx, &root, resource_type)?;

        let ctx = match expression {
            Some(expr) => {
                let ctx = ctx.append(" AND (");
                self.visit(expr, ctx, Scope::Resource { alias: &root })?
                    .append(")")
            }
            None => ctx,
        };

        let ctx = match page.after {
            Some(after) => ctx
                .append(" AND ")
                .append_qualified(&root, &ResourceTable::RESOURCE_SURROGATE_ID)
                .append(" > ")
                .bind(after),
            None => ctx,
        };

        let query = ctx
            .append(" ORDER BY ")
            .append_qualified(&root, &ResourceTable::RESOURCE_SURROGATE_ID)
            .append(" LIMIT ")
            .bind(page.limit())
            .finish();

        debug!(
            resource_type,
            parameters = query.parameters.len(),
            "compiled search query"
        );
        Ok(query)
    }

    /// Compiles only the predicate of `expression` against a resource alias.
    /// Useful to inspect the SQL of a single node.
    pub fn compile_predicate(
        &self,
        expression: &Expression,
        resource_alias: &str,
    ) -> GenerationResult<CompiledQuery> {
        let ctx = QueryContext::new(self.catalog);
        Ok(self
            .visit(
                expression,
                ctx,
                Scope::Resource {
                    alias: resource_alias,
                },
            )?
            .finish())
    }

    /// `<alias>.IsHistory = 0 AND <alias>.IsDeleted = 0 AND <alias>.ResourceTypeId <normalized>`
    fn live_resource_of_type<'c>(
        &self,
        ctx: QueryContext<'c>,
        alias: &str,
        resource_type: &str,
    ) -> GenerationResult<QueryContext<'c>> {
        ctx.append_qualified(alias, &ResourceTable::IS_HISTORY)
            .append(" = 0 AND ")
            .append_qualified(alias, &ResourceTable::IS_DELETED)
            .append(" = 0 AND ")
            .with_alias(alias, |ctx| {
                Ok(ctx.normalized_equality(
                    &ResourceTable::RESOURCE_TYPE_ID,
                    None,
                    KeyNamespace::ResourceType,
                    resource_type,
                ))
            })
    }

    fn visit<'c>(
        &self,
        expr: &Expression,
        ctx: QueryContext<'c>,
        scope: Scope<'_>,
    ) -> GenerationResult<QueryContext<'c>> {
        match expr {
            Expression::Binary(e) => {
                let generator = self.field_generator(expr, e.field, e.component_index, scope)?;
                self.in_field_scope(e.field, scope, ctx, |ctx| generator.visit_binary(e, ctx))
            }
            Expression::StringMatch(e) => {
                let generator = self.field_generator(expr, e.field, e.component_index, scope)?;
                self.in_field_scope(e.field, scope, ctx, |ctx| generator.visit_string(e, ctx))
            }
            Expression::MissingField(e) => {
                let generator = self.field_generator(expr, e.field, e.component_index, scope)?;
                self.in_field_scope(e.field, scope, ctx, |ctx| {
                    generator.visit_missing_field(e, ctx)
                })
            }
            Expression::In(e) => {
                let generator = self.field_generator(expr, e.field, e.component_index, scope)?;
                self.in_field_scope(e.field, scope, ctx, |ctx| generator.visit_in(e, ctx))
            }
            Expression::SearchParameter(e) => {
                self.visit_parameter_scope(&e.parameter, &e.expression, ctx, scope)
            }
            Expression::MissingParameter(e) => {
                self.visit_missing_parameter(&e.parameter, e.is_missing, ctx, scope)
            }
            Expression::Chained(e) => self.visit_chained(e, ctx, scope),
            Expression::CompositeGroup(operands) => match scope {
                Scope::Parameter {
                    composite: true, ..
                } => self.visit_junction("composite-group", " AND ", operands, ctx, scope),
                Scope::Parameter { generator, .. } => {
                    Err(QueryGenerationError::UnsupportedExpression {
                        generator: generator.name(),
                        expression: "composite-group",
                    })
                }
                Scope::Resource { .. } => Err(QueryGenerationError::UnsupportedExpression {
                    generator: ResourceTableQueryGenerator.name(),
                    expression: "composite-group",
                }),
            },
            Expression::And(operands) => self.visit_junction("and", " AND ", operands, ctx, scope),
            Expression::Or(operands) => self.visit_junction("or", " OR ", operands, ctx, scope),
            Expression::Not(operand) => {
                let ctx = ctx.append("NOT (");
                Ok(self.visit(operand, ctx, scope)?.append(")"))
            }
        }
    }

    /// Resolves the generator that renders a field-level node.
    ///
    /// `_id` and `_lastUpdated` live on the resource row and are valid in any
    /// scope. Every other field needs an enclosing parameter scope.
    fn field_generator(
        &self,
        expr: &Expression,
        field: FieldName,
        component_index: Option<u32>,
        scope: Scope<'_>,
    ) -> GenerationResult<&'static dyn SearchParameterQueryGenerator> {
        if is_resource_field(field) {
            return Ok(&ResourceTableQueryGenerator);
        }

        match scope {
            Scope::Resource { .. } => Err(QueryGenerationError::MissingParameterScope {
                expression: expr.kind_name(),
                field,
            }),
            Scope::Parameter {
                generator,
                composite,
                ..
            } => match component_index {
                Some(index) if !composite => Err(QueryGenerationError::InvalidComponentIndex {
                    generator: generator.name(),
                    index,
                    count: 0,
                }),
                _ => Ok(generator),
            },
        }
    }

    /// Runs `f` with the table alias a field belongs to.
    fn in_field_scope<'c, F>(
        &self,
        field: FieldName,
        scope: Scope<'_>,
        ctx: QueryContext<'c>,
        f: F,
    ) -> GenerationResult<QueryContext<'c>>
    where
        F: FnOnce(QueryContext<'c>) -> GenerationResult<QueryContext<'c>>,
    {
        if is_resource_field(field) {
            ctx.with_alias(scope.resource_alias(), f)
        } else {
            f(ctx)
        }
    }

    fn visit_junction<'c>(
        &self,
        operator: &'static str,
        separator: &str,
        operands: &[Expression],
        ctx: QueryContext<'c>,
        scope: Scope<'_>,
    ) -> GenerationResult<QueryContext<'c>> {
        if operands.is_empty() {
            return Err(QueryGenerationError::EmptyOperands { operator });
        }

        let mut ctx = ctx.append("(");
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                ctx = ctx.append(separator);
            }
            ctx = self.visit(operand, ctx, scope)?;
        }
        Ok(ctx.append(")"))
    }

    /// `EXISTS (SELECT 1 FROM <table> pN WHERE pN.ResourceSurrogateId = rM.ResourceSurrogateId AND pN.SearchParamId <normalized> AND (<inner>))`
    fn visit_parameter_scope<'c>(
        &self,
        parameter: &ParameterRef,
        inner: &Expression,
        ctx: QueryContext<'c>,
        scope: Scope<'_>,
    ) -> GenerationResult<QueryContext<'c>> {
        let resource_alias = scope.resource_alias();

        if parameter.kind == ParameterKind::Resource {
            return self.visit(
                inner,
                ctx,
                Scope::Resource {
                    alias: resource_alias,
                },
            );
        }

        let generator = generator_for(parameter.kind);
        let (ctx, alias) = ctx.next_alias("p");
        let ctx = self.open_parameter_rows(ctx, parameter, &alias, resource_alias, "EXISTS")?;
        let ctx = ctx.append(" AND (");

        let inner_scope = Scope::Parameter {
            resource_alias,
            generator,
            composite: matches!(parameter.kind, ParameterKind::Composite(_)),
        };
        let ctx = ctx.with_alias(&alias, |ctx| self.visit(inner, ctx, inner_scope))?;
        Ok(ctx.append("))"))
    }

    /// `[NOT ]EXISTS (SELECT 1 FROM <table> pN WHERE .. )`
    fn visit_missing_parameter<'c>(
        &self,
        parameter: &ParameterRef,
        is_missing: bool,
        ctx: QueryContext<'c>,
        scope: Scope<'_>,
    ) -> GenerationResult<QueryContext<'c>> {
        if parameter.kind == ParameterKind::Resource {
            return Err(QueryGenerationError::UnsupportedExpression {
                generator: ResourceTableQueryGenerator.name(),
                expression: "missing-parameter",
            });
        }

        let (ctx, alias) = ctx.next_alias("p");
        let keyword = if is_missing { "NOT EXISTS" } else { "EXISTS" };
        let ctx =
            self.open_parameter_rows(ctx, parameter, &alias, scope.resource_alias(), keyword)?;
        Ok(ctx.append(")"))
    }

    /// Opens `<keyword> (SELECT 1 FROM <table> <alias> WHERE <join> AND <param id>`.
    /// The caller closes the parenthesis.
    fn open_parameter_rows<'c>(
        &self,
        ctx: QueryContext<'c>,
        parameter: &ParameterRef,
        alias: &str,
        resource_alias: &str,
        keyword: &str,
    ) -> GenerationResult<QueryContext<'c>> {
        let table = generator_for(parameter.kind).table();
        ctx.append(keyword)
            .append(" (SELECT 1 FROM ")
            .append(table.name)
            .append(" ")
            .append(alias)
            .append(" WHERE ")
            .append_qualified(alias, &SearchParamTable::RESOURCE_SURROGATE_ID)
            .append(" = ")
            .append_qualified(resource_alias, &ResourceTable::RESOURCE_SURROGATE_ID)
            .append(" AND ")
            .with_alias(alias, |ctx| {
                Ok(ctx.normalized_equality(
                    &SearchParamTable::SEARCH_PARAM_ID,
                    None,
                    KeyNamespace::SearchParam,
                    &parameter.url,
                ))
            })
    }

    /// Forward chains filter the referencing resource by a predicate on the
    /// referenced one; reverse chains filter the referenced resource by a
    /// predicate on a referencing one.
    fn visit_chained<'c>(
        &self,
        chain: &ChainedExpression,
        ctx: QueryContext<'c>,
        scope: Scope<'_>,
    ) -> GenerationResult<QueryContext<'c>> {
        if chain.reference.kind != ParameterKind::Reference {
            return Err(QueryGenerationError::UnsupportedExpression {
                generator: generator_for(chain.reference.kind).name(),
                expression: "chained",
            });
        }

        let outer = scope.resource_alias();
        let (ctx, refs) = ctx.next_alias("p");
        let (ctx, far) = ctx.next_alias("r");

        // join: reference row <-> far resource row
        let ctx = ctx
            .append("EXISTS (SELECT 1 FROM ")
            .append(ReferenceSearchParamTable::TABLE.name)
            .append(" ")
            .append(&refs)
            .append(" JOIN Resource ")
            .append(&far)
            .append(" ON ");
        let ctx = if chain.reversed {
            ctx.append_qualified(&far, &ResourceTable::RESOURCE_SURROGATE_ID)
                .append(" = ")
                .append_qualified(&refs, &SearchParamTable::RESOURCE_SURROGATE_ID)
        } else {
            ctx.append_qualified(&far, &ResourceTable::RESOURCE_ID)
                .append(" = ")
                .append_qualified(&refs, &ReferenceSearchParamTable::REFERENCE_RESOURCE_ID)
        };

        // join: reference row <-> outer resource row
        let ctx = ctx.append(" WHERE ");
        let ctx = if chain.reversed {
            ctx.append_qualified(&refs, &ReferenceSearchParamTable::REFERENCE_RESOURCE_ID)
                .append(" = ")
                .append_qualified(outer, &ResourceTable::RESOURCE_ID)
        } else {
            ctx.append_qualified(&refs, &SearchParamTable::RESOURCE_SURROGATE_ID)
                .append(" = ")
                .append_qualified(outer, &ResourceTable::RESOURCE_SURROGATE_ID)
        };

        let ctx = ctx.append(" AND ").with_alias(&refs, |ctx| {
            Ok(ctx
                .normalized_equality(
                    &SearchParamTable::SEARCH_PARAM_ID,
                    None,
                    KeyNamespace::SearchParam,
                    &chain.reference.url,
                )
                .append(" AND ")
                .normalized_equality(
                    &ReferenceSearchParamTable::REFERENCE_RESOURCE_TYPE_ID,
                    None,
                    KeyNamespace::ResourceType,
                    &chain.target_type,
                ))
        })?;

        let far_type = if chain.reversed {
            &chain.source_type
        } else {
            &chain.target_type
        };
        let ctx = ctx.append(" AND ");
        let ctx = self.live_resource_of_type(ctx, &far, far_type)?;

        let ctx = ctx.append(" AND (");
        let ctx = self.visit(&chain.expression, ctx, Scope::Resource { alias: &far })?;
        Ok(ctx.append("))"))
    }
}

fn is_resource_field(field: FieldName) -> bool {
    matches!(field, FieldName::ResourceId | FieldName::LastUpdated)
}
