//! Renders query metadata into SQL text plus the ordered constants it binds.

use std::collections::HashMap;

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::expr::{ColumnRef, Expr, NullHandling, Operator, Order, OrderSpecifier, TableRef};
use crate::metadata::{JoinType, Position, QueryMetadata};
use crate::templates::SqlTemplates;
use crate::value::Value;

/// A constant slot in rendered SQL
#[derive(Debug, Clone, PartialEq)]
pub enum Bindable {
    Value(Value),
    Param(String),
}

/// Rendered SQL with anonymous `?` markers and the constants they stand for
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SerializedSql {
    pub sql: String,
    pub constants: Vec<Bindable>,
    /// Parameter values gathered from every rendered query level
    pub params: HashMap<String, Value>,
}

impl SerializedSql {
    /// Bind values in marker order, resolving named parameters
    pub fn resolve(&self) -> Result<Vec<Value>> {
        self.constants
            .iter()
            .map(|constant| match constant {
                Bindable::Value(value) => Ok(value.clone()),
                Bindable::Param(name) => self
                    .params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::ParamNotSet(name.clone())),
            })
            .collect()
    }
}

pub struct SqlSerializer<'a> {
    templates: &'a dyn SqlTemplates,
    use_literals: bool,
    dml: bool,
    depth: usize,
    sql: String,
    constants: Vec<Bindable>,
    params: HashMap<String, Value>,
}

impl<'a> SqlSerializer<'a> {
    pub fn new(configuration: &'a Configuration) -> Self {
        Self {
            templates: configuration.templates(),
            use_literals: configuration.use_literals(),
            dml: false,
            depth: 0,
            sql: String::new(),
            constants: Vec::new(),
            params: HashMap::new(),
        }
    }

    pub fn with_use_literals(mut self, use_literals: bool) -> Self {
        self.use_literals = use_literals;
        self
    }

    pub fn serialize_query(mut self, metadata: &QueryMetadata) -> Result<SerializedSql> {
        self.query(metadata)?;
        Ok(self.finish())
    }

    pub fn serialize_union(
        mut self,
        members: &[QueryMetadata],
        all: bool,
        outer: &QueryMetadata,
    ) -> Result<SerializedSql> {
        self.collect_params(outer);
        let wrapped = !outer.group_by.is_empty() || outer.having.is_some();
        if wrapped {
            self.sql.push_str("select ");
            self.projection(outer)?;
            self.sql.push_str(" from (");
        }
        self.union_members(members, all)?;
        if wrapped {
            self.sql.push_str(") as ");
            self.identifier("union");
            self.group_by_and_having(outer)?;
        }
        self.order_by(&outer.order_by)?;
        self.sql.push_str(
            &self
                .templates
                .limit_offset(outer.modifiers.limit, outer.modifiers.offset),
        );
        self.flags(outer, Position::End)?;
        Ok(self.finish())
    }

    /// Insert of one or more value rows, or of a subquery's rows
    pub fn serialize_insert(
        mut self,
        metadata: &QueryMetadata,
        entity: &TableRef,
        columns: &[ColumnRef],
        rows: &[Vec<Expr>],
        subquery: Option<&QueryMetadata>,
    ) -> Result<SerializedSql> {
        self.dml = true;
        self.collect_params(metadata);
        self.flags(metadata, Position::Start)?;
        if metadata.has_flag_at(Position::StartOverride) {
            self.flags(metadata, Position::StartOverride)?;
        } else {
            self.sql.push_str("insert into ");
        }
        self.target(entity);
        if !columns.is_empty() {
            self.sql.push_str(" (");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.identifier(&column.name);
            }
            self.sql.push(')');
        }
        if let Some(subquery) = subquery {
            self.sql.push(' ');
            self.depth += 1;
            self.query(subquery)?;
            self.depth -= 1;
        } else {
            self.sql.push_str(" values ");
            for (i, row) in rows.iter().enumerate() {
                if !columns.is_empty() && row.len() != columns.len() {
                    return Err(Error::ParameterCount {
                        expected: columns.len(),
                        actual: row.len(),
                    });
                }
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.sql.push('(');
                self.list(row)?;
                self.sql.push(')');
            }
        }
        self.flags(metadata, Position::End)?;
        Ok(self.finish())
    }

    pub fn serialize_update(
        mut self,
        metadata: &QueryMetadata,
        entity: &TableRef,
        updates: &[(ColumnRef, Expr)],
    ) -> Result<SerializedSql> {
        self.dml = true;
        self.collect_params(metadata);
        self.flags(metadata, Position::Start)?;
        if metadata.has_flag_at(Position::StartOverride) {
            self.flags(metadata, Position::StartOverride)?;
        } else {
            self.sql.push_str("update ");
        }
        self.target(entity);
        self.sql.push_str(" set ");
        for (i, (column, value)) in updates.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.identifier(&column.name);
            self.sql.push_str(" = ");
            self.expr(value)?;
        }
        self.filter(metadata)?;
        self.dml_limit(metadata, "update")?;
        self.flags(metadata, Position::End)?;
        Ok(self.finish())
    }

    pub fn serialize_delete(
        mut self,
        metadata: &QueryMetadata,
        entity: &TableRef,
    ) -> Result<SerializedSql> {
        self.dml = true;
        self.collect_params(metadata);
        self.flags(metadata, Position::Start)?;
        if metadata.has_flag_at(Position::StartOverride) {
            self.flags(metadata, Position::StartOverride)?;
        } else {
            self.sql.push_str("delete from ");
        }
        self.target(entity);
        self.filter(metadata)?;
        self.dml_limit(metadata, "delete")?;
        self.flags(metadata, Position::End)?;
        Ok(self.finish())
    }

    fn finish(self) -> SerializedSql {
        SerializedSql {
            sql: self.sql,
            constants: self.constants,
            params: self.params,
        }
    }

    fn collect_params(&mut self, metadata: &QueryMetadata) {
        for (name, value) in &metadata.params {
            self.params
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    fn query(&mut self, metadata: &QueryMetadata) -> Result<()> {
        self.collect_params(metadata);
        self.flags(metadata, Position::Start)?;
        if metadata.has_flag_at(Position::StartOverride) {
            self.flags(metadata, Position::StartOverride)?;
        } else {
            self.sql.push_str("select ");
        }
        self.flags(metadata, Position::AfterSelect)?;
        if metadata.distinct {
            self.sql.push_str("distinct ");
        }
        self.projection(metadata)?;
        self.flags(metadata, Position::AfterProjection)?;
        if !metadata.joins.is_empty() {
            self.sql.push_str(" from ");
            self.joins(metadata)?;
        }
        self.filter(metadata)?;
        self.group_by_and_having(metadata)?;
        self.flags(metadata, Position::BeforeOrder)?;
        self.order_by(&metadata.order_by)?;
        self.sql.push_str(
            &self
                .templates
                .limit_offset(metadata.modifiers.limit, metadata.modifiers.offset),
        );
        self.flags(metadata, Position::End)
    }

    fn projection(&mut self, metadata: &QueryMetadata) -> Result<()> {
        if metadata.projection.is_empty() {
            self.sql.push('*');
            return Ok(());
        }
        self.list(&metadata.projection)
    }

    fn joins(&mut self, metadata: &QueryMetadata) -> Result<()> {
        for (i, join) in metadata.joins.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(match join.join_type {
                    JoinType::Default => ", ",
                    JoinType::Inner => " inner join ",
                    JoinType::Left => " left join ",
                    JoinType::Right => " right join ",
                    JoinType::Full => " full join ",
                });
            }
            self.expr(&join.target)?;
            if let Some(condition) = &join.condition {
                self.sql.push_str(" on ");
                self.expr(condition)?;
            }
        }
        Ok(())
    }

    fn filter(&mut self, metadata: &QueryMetadata) -> Result<()> {
        self.flags(metadata, Position::BeforeFilters)?;
        if let Some(filter) = &metadata.filter {
            self.sql.push_str(" where ");
            self.expr(filter)?;
        }
        self.flags(metadata, Position::AfterFilters)
    }

    fn group_by_and_having(&mut self, metadata: &QueryMetadata) -> Result<()> {
        self.flags(metadata, Position::BeforeGroupBy)?;
        if !metadata.group_by.is_empty() {
            self.sql.push_str(" group by ");
            self.list(&metadata.group_by)?;
        }
        self.flags(metadata, Position::AfterGroupBy)?;
        self.flags(metadata, Position::BeforeHaving)?;
        if let Some(having) = &metadata.having {
            self.sql.push_str(" having ");
            self.expr(having)?;
        }
        self.flags(metadata, Position::AfterHaving)
    }

    fn order_by(&mut self, order_by: &[OrderSpecifier]) -> Result<()> {
        if order_by.is_empty() {
            return Ok(());
        }
        self.sql.push_str(" order by ");
        for (i, order) in order_by.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            let native_nulls = self.templates.supports_nulls_ordering();
            if !native_nulls && order.null_handling != NullHandling::Default {
                self.expr(&order.target)?;
                self.sql.push_str(match order.null_handling {
                    NullHandling::NullsFirst => " is null desc, ",
                    _ => " is null asc, ",
                });
            }
            self.expr(&order.target)?;
            self.sql.push_str(match order.order {
                Order::Asc => " asc",
                Order::Desc => " desc",
            });
            if native_nulls {
                match order.null_handling {
                    NullHandling::NullsFirst => self.sql.push_str(" nulls first"),
                    NullHandling::NullsLast => self.sql.push_str(" nulls last"),
                    NullHandling::Default => {}
                }
            }
        }
        Ok(())
    }

    fn dml_limit(&mut self, metadata: &QueryMetadata, statement: &str) -> Result<()> {
        if let Some(limit) = metadata.modifiers.limit {
            if !self.templates.supports_dml_limit() {
                return Err(Error::Unsupported(format!(
                    "limit is not supported in {} statements by {}",
                    statement,
                    self.templates.name()
                )));
            }
            self.sql.push_str(&format!(" limit {}", limit));
        }
        Ok(())
    }

    fn union_members(&mut self, members: &[QueryMetadata], all: bool) -> Result<()> {
        let wrap = self.templates.wrap_union_members();
        self.depth += 1;
        for (i, member) in members.iter().enumerate() {
            if i > 0 {
                self.sql
                    .push_str(if all { " union all " } else { " union " });
            }
            if wrap {
                self.sql.push('(');
            }
            self.query(member)?;
            if wrap {
                self.sql.push(')');
            }
        }
        self.depth -= 1;
        Ok(())
    }

    fn flags(&mut self, metadata: &QueryMetadata, position: Position) -> Result<()> {
        for flag in metadata.flags_at(position) {
            self.expr(&flag.flag)?;
        }
        Ok(())
    }

    fn identifier(&mut self, identifier: &str) {
        let quoted = self.templates.quote_identifier(identifier);
        self.sql.push_str(&quoted);
    }

    fn target(&mut self, table: &TableRef) {
        if let Some(schema) = &table.schema {
            self.identifier(schema);
            self.sql.push('.');
        }
        self.identifier(&table.name);
    }

    fn list(&mut self, exprs: &[Expr]) -> Result<()> {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.expr(expr)?;
        }
        Ok(())
    }

    fn constant(&mut self, value: &Value) {
        if self.use_literals {
            let literal = self.templates.literal(value);
            self.sql.push_str(&literal);
        } else {
            self.sql.push('?');
            self.constants.push(Bindable::Value(value.clone()));
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Column(column) => {
                let unqualified = self.dml && self.depth == 0;
                if let (Some(qualifier), false) = (&column.qualifier, unqualified) {
                    self.identifier(qualifier);
                    self.sql.push('.');
                }
                self.identifier(&column.name);
            }
            Expr::Table(table) => {
                self.target(table);
                if table.alias != table.name {
                    self.sql.push_str(" as ");
                    self.identifier(&table.alias);
                }
            }
            Expr::Constant(value) => self.constant(value),
            Expr::Param(name) => {
                if self.use_literals {
                    let value = self
                        .params
                        .get(name)
                        .cloned()
                        .ok_or_else(|| Error::ParamNotSet(name.clone()))?;
                    self.constant(&value);
                } else {
                    self.sql.push('?');
                    self.constants.push(Bindable::Param(name.clone()));
                }
            }
            Expr::Null => self.sql.push_str("null"),
            Expr::Operation { op, args } => self.operation(*op, args)?,
            Expr::Template { template, args } => self.template(template, args)?,
            Expr::SubQuery(metadata) => {
                self.sql.push('(');
                self.depth += 1;
                self.query(metadata)?;
                self.depth -= 1;
                self.sql.push(')');
            }
            Expr::Union { all, members } => {
                self.sql.push('(');
                self.union_members(members, *all)?;
                self.sql.push(')');
            }
            Expr::Alias { expr, alias } => {
                if alias.is_empty() {
                    return Err(Error::InvalidExpression(format!(
                        "alias of {:?} has no name",
                        expr
                    )));
                }
                self.expr(expr)?;
                self.sql.push_str(" as ");
                self.identifier(alias);
            }
            Expr::List(items) => self.list(items)?,
            Expr::Wildcard => self.sql.push('*'),
        }
        Ok(())
    }

    fn operand(&mut self, expr: &Expr, wrap: impl Fn(Operator) -> bool) -> Result<()> {
        match expr {
            Expr::Operation { op, .. } if wrap(*op) => {
                self.sql.push('(');
                self.expr(expr)?;
                self.sql.push(')');
                Ok(())
            }
            _ => self.expr(expr),
        }
    }

    fn function(&mut self, name: &str, args: &[Expr]) -> Result<()> {
        self.sql.push_str(name);
        self.sql.push('(');
        self.list(args)?;
        self.sql.push(')');
        Ok(())
    }

    fn operation(&mut self, op: Operator, args: &[Expr]) -> Result<()> {
        let boolean = |op: Operator| matches!(op, Operator::And | Operator::Or);
        let arg = move |index: usize| {
            args.get(index).ok_or_else(|| {
                Error::InvalidExpression(format!(
                    "{:?} needs at least {} operands, got {}",
                    op,
                    index + 1,
                    args.len()
                ))
            })
        };
        match op {
            Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Goe
            | Operator::Lt
            | Operator::Loe
            | Operator::Like => {
                let symbol = match op {
                    Operator::Eq => " = ",
                    Operator::Ne => " <> ",
                    Operator::Gt => " > ",
                    Operator::Goe => " >= ",
                    Operator::Lt => " < ",
                    Operator::Loe => " <= ",
                    _ => " like ",
                };
                self.operand(arg(0)?, boolean)?;
                self.sql.push_str(symbol);
                self.operand(arg(1)?, boolean)?;
            }
            Operator::In | Operator::NotIn => {
                let negated = op == Operator::NotIn;
                match arg(1)? {
                    Expr::List(items) if items.is_empty() => {
                        self.sql.push_str(if negated { "1 = 1" } else { "1 = 0" });
                    }
                    Expr::List(items) => {
                        self.operand(arg(0)?, boolean)?;
                        self.sql
                            .push_str(if negated { " not in (" } else { " in (" });
                        self.list(items)?;
                        self.sql.push(')');
                    }
                    other => {
                        self.operand(arg(0)?, boolean)?;
                        self.sql.push_str(if negated { " not in " } else { " in " });
                        self.expr(other)?;
                    }
                }
            }
            Operator::IsNull | Operator::IsNotNull => {
                self.operand(arg(0)?, boolean)?;
                self.sql.push_str(if op == Operator::IsNull {
                    " is null"
                } else {
                    " is not null"
                });
            }
            Operator::And | Operator::Or => {
                let separator = if op == Operator::And { " and " } else { " or " };
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(separator);
                    }
                    self.operand(arg, |inner| inner == Operator::Or && op == Operator::And)?;
                }
            }
            Operator::Not => {
                self.sql.push_str("not (");
                self.expr(arg(0)?)?;
                self.sql.push(')');
            }
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div => {
                let symbol = match op {
                    Operator::Add => " + ",
                    Operator::Sub => " - ",
                    Operator::Mul => " * ",
                    _ => " / ",
                };
                self.operand(arg(0)?, |inner| inner.is_arithmetic() || boolean(inner))?;
                self.sql.push_str(symbol);
                self.operand(arg(1)?, |inner| inner.is_arithmetic() || boolean(inner))?;
            }
            Operator::Count => self.function("count", args)?,
            Operator::CountDistinct => {
                self.sql.push_str("count(distinct ");
                self.list(args)?;
                self.sql.push(')');
            }
            Operator::CountAll => self.sql.push_str("count(*)"),
            Operator::Sum => self.function("sum", args)?,
            Operator::Avg => self.function("avg", args)?,
            Operator::Min => self.function("min", args)?,
            Operator::Max => self.function("max", args)?,
            Operator::Coalesce => self.function("coalesce", args)?,
            Operator::Lower => self.function("lower", args)?,
            Operator::Upper => self.function("upper", args)?,
            Operator::Exists => {
                self.sql.push_str("exists ");
                self.expr(arg(0)?)?;
            }
        }
        Ok(())
    }

    fn template(&mut self, template: &str, args: &[Expr]) -> Result<()> {
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            self.sql.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let index = after
                .find('}')
                .and_then(|close| after[..close].parse::<usize>().ok().map(|i| (i, close)));
            match index {
                Some((i, close)) if i < args.len() => {
                    self.expr(&args[i])?;
                    rest = &after[close + 1..];
                }
                _ => {
                    self.sql.push('{');
                    rest = after;
                }
            }
        }
        self.sql.push_str(rest);
        Ok(())
    }
}
