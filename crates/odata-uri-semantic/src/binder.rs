//! Metadata binder
//!
//! Turns a syntactic [`QueryToken`] tree into a typed [`QueryNode`] tree by
//! resolving every identifier against the model. Dispatch is a single `match`
//! over the token kind; each arm binds its children first and then applies
//! the typing rule for the construct.
//!
//! Identifiers without a source resolve in this order: lambda range variables
//! (innermost first), `$it`, then members of the `$it` type.

use crate::clauses::{FilterClause, OrderByClause, OrderByItem};
use crate::functions::{is_built_in, resolve_overload, ArgumentType, TYPE_FUNCTIONS};
use crate::nodes::{
    CollectionNode, ConstantNode, FunctionArgument, FunctionCallNode, LambdaNode, QueryNode,
    RangeVariable, SingleEntityNode, SingleValueNode,
};
use crate::promotion::{binary_typing, can_promote, Operand};
use crate::scope::BindingState;
use odata_uri_ast::{
    BinaryOperatorKind, LambdaKind, LiteralValue, OrderByToken, QueryToken, Spanned,
    UnaryOperatorKind,
};
use odata_uri_diagnostics::{
    ODataError, Result, Span, ODU0151, ODU0152, ODU0154, ODU0155, ODU0156, ODU0157, ODU0158, ODU0159,
    ODU0160,
};
use odata_uri_edm::{EdmModel, EdmTypeRef, Operation, OperationKind};
use odata_uri_parser::parse_filter;

/// Binds syntactic trees against the model, borrowing the scope of one bind operation
pub struct MetadataBinder<'s, 'a> {
    state: &'s mut BindingState<'a>,
}

impl<'s, 'a> MetadataBinder<'s, 'a> {
    pub fn new(state: &'s mut BindingState<'a>) -> Self {
        Self { state }
    }

    fn model(&self) -> &'a dyn EdmModel {
        self.state.model()
    }

    /// Bind a `$filter` expression; the result must be boolean or `null`
    pub fn bind_filter(&mut self, token: &Spanned<QueryToken>) -> Result<FilterClause> {
        let expression = self.bind_single(token)?;
        require_boolean(&expression, "$filter expression", token.span)?;
        Ok(FilterClause {
            expression,
            range_variable: self.state.implicit_range_variable().clone(),
        })
    }

    /// Bind the items of a `$orderby`
    pub fn bind_order_by(&mut self, tokens: &[OrderByToken]) -> Result<OrderByClause> {
        let items = tokens
            .iter()
            .map(|token| {
                Ok(OrderByItem {
                    expression: self.bind_single(&token.expression)?,
                    direction: token.direction,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(OrderByClause {
            items,
            range_variable: self.state.implicit_range_variable().clone(),
        })
    }

    /// Bind any token
    pub fn bind(&mut self, token: &Spanned<QueryToken>) -> Result<QueryNode> {
        let span = token.span;
        match &token.inner {
            QueryToken::Literal(literal) => {
                Ok(SingleValueNode::Constant(ConstantNode::new(literal.value.clone())).into())
            }
            QueryToken::BinaryOperator {
                operator,
                left,
                right,
            } => self.bind_binary(*operator, left, right, span).map(Into::into),
            QueryToken::UnaryOperator { operator, operand } => {
                self.bind_unary(*operator, operand, span).map(Into::into)
            }
            QueryToken::PropertyAccess { identifier, source } => {
                self.bind_property_access(identifier, source.as_deref(), span)
            }
            QueryToken::RangeVariable(name) => self.bind_range_variable(name, span).map(Into::into),
            QueryToken::FunctionCall {
                name,
                arguments,
                source,
            } => self.bind_function_call(name, arguments, source.as_deref(), span),
            QueryToken::Lambda {
                kind,
                source,
                parameter,
                body,
            } => self
                .bind_lambda(*kind, source, parameter.as_deref(), body.as_deref(), span)
                .map(Into::into),
            QueryToken::TypeCast { type_name, source } => {
                self.bind_type_cast(type_name, source.as_deref(), span)
            }
            QueryToken::Count { source } => self.bind_count(source, span).map(Into::into),
            QueryToken::ParameterAlias(name) => {
                self.bind_parameter_alias(name, span).map(Into::into)
            }
            QueryToken::NamedArgument { name, .. } => Err(ODataError::semantic_at(
                ODU0160,
                format!("named argument '{name}' is only allowed inside a function call"),
                span,
            )),
        }
    }

    /// Bind a token that must produce a single value
    pub fn bind_single(&mut self, token: &Spanned<QueryToken>) -> Result<SingleValueNode> {
        match self.bind(token)? {
            QueryNode::Single(node) => Ok(node),
            QueryNode::Collection(node) => Err(ODataError::semantic_at(
                ODU0160,
                format!(
                    "expected a single value, found a {} of type '{}'",
                    node.kind_name(),
                    node.type_ref()
                ),
                token.span,
            )),
        }
    }

    fn bind_binary(
        &mut self,
        operator: BinaryOperatorKind,
        left: &Spanned<QueryToken>,
        right: &Spanned<QueryToken>,
        span: Span,
    ) -> Result<SingleValueNode> {
        let left = self.bind_single(left)?;
        let right = self.bind_single(right)?;
        let (left_type, right_type) = (left.type_ref(), right.type_ref());

        let typing = binary_typing(
            operator,
            Operand {
                type_ref: &left_type,
                constant: left.is_constant(),
            },
            Operand {
                type_ref: &right_type,
                constant: right.is_constant(),
            },
        )
        .ok_or_else(|| ODataError::IncompatibleOperands {
            operator: operator.keyword().to_string(),
            left: left_type.full_name(),
            right: right_type.full_name(),
            span,
        })?;

        Ok(SingleValueNode::BinaryOperator {
            operator,
            left: Box::new(left.convert_to(&typing.operand_type)),
            right: Box::new(right.convert_to(&typing.operand_type)),
            type_ref: typing.result_type,
        })
    }

    fn bind_unary(
        &mut self,
        operator: UnaryOperatorKind,
        operand: &Spanned<QueryToken>,
        span: Span,
    ) -> Result<SingleValueNode> {
        let operand = self.bind_single(operand)?;
        let type_ref = operand.type_ref();
        let applicable = match (operator, &type_ref) {
            (_, EdmTypeRef::Untyped) => true,
            (UnaryOperatorKind::Negate, EdmTypeRef::Primitive(kind)) => kind.is_numeric(),
            (UnaryOperatorKind::Not, other) => *other == EdmTypeRef::boolean(),
            _ => false,
        };
        if !applicable {
            return Err(ODataError::semantic_at(
                ODU0151,
                format!(
                    "operator '{}' is not defined for operand type '{type_ref}'",
                    operator.symbol()
                ),
                span,
            ));
        }
        Ok(SingleValueNode::UnaryOperator {
            operator,
            operand: Box::new(operand),
            type_ref,
        })
    }

    fn bind_property_access(
        &mut self,
        identifier: &str,
        source: Option<&Spanned<QueryToken>>,
        span: Span,
    ) -> Result<QueryNode> {
        let parent = match source {
            Some(source) => match self.bind(source)? {
                QueryNode::Single(parent) => parent,
                QueryNode::Collection(collection) => {
                    return Err(ODataError::semantic_at(
                        ODU0156,
                        format!(
                            "cannot access '{identifier}' on collection '{}'; use any() or all()",
                            collection.type_ref()
                        ),
                        span,
                    ));
                }
            },
            None => {
                if let Some(variable) = self.state.find_range_variable(identifier) {
                    return Ok(variable.reference().into());
                }
                self.state.implicit_range_variable().reference()
            }
        };
        self.resolve_member(parent, identifier, span)
    }

    /// Resolve `identifier` as a member of the type of `parent`
    fn resolve_member(&self, parent: SingleValueNode, identifier: &str, span: Span) -> Result<QueryNode> {
        let parent_type = parent.type_ref();
        if parent_type.is_untyped() {
            // members of dynamic values are dynamic too
            return Ok(SingleValueNode::OpenPropertyAccess {
                source: Box::new(parent),
                name: identifier.to_string(),
            }
            .into());
        }
        let Some(type_name) = parent_type.structured_name() else {
            return Err(ODataError::semantic_at(
                ODU0156,
                format!("cannot access '{identifier}' on a value of type '{parent_type}'"),
                span,
            ));
        };

        let model = self.model();
        let property = model.find_property(type_name, identifier);
        let navigation = model.find_navigation_property(type_name, identifier);
        match (property, navigation) {
            (Some(_), Some(_)) => Err(ODataError::AmbiguousBinding {
                name: identifier.to_string(),
                candidates: vec![
                    format!("structural property {type_name}/{identifier}"),
                    format!("navigation property {type_name}/{identifier}"),
                ],
                span,
            }),
            (Some(property), None) => {
                let source = Box::new(parent);
                let property_name = property.name.clone();
                let type_ref = property.type_ref.clone();
                Ok(if type_ref.is_collection() {
                    CollectionNode::PropertyAccess {
                        source,
                        property: property_name,
                        type_ref,
                    }
                    .into()
                } else {
                    SingleValueNode::PropertyAccess {
                        source,
                        property: property_name,
                        type_ref,
                    }
                    .into()
                })
            }
            (None, Some(navigation)) => {
                let entity_set = parent
                    .entity_set()
                    .and_then(|set| model.navigation_target(set, &navigation.name))
                    .map(|set| set.name.clone());
                let source = Box::new(parent);
                Ok(if navigation.is_collection() {
                    CollectionNode::Navigation {
                        source,
                        navigation: navigation.name.clone(),
                        type_ref: navigation.type_ref(),
                        entity_set,
                    }
                    .into()
                } else {
                    SingleEntityNode::Navigation {
                        source,
                        navigation: navigation.name.clone(),
                        type_ref: navigation.type_ref(),
                        entity_set,
                    }
                    .into()
                })
            }
            (None, None) if model.is_open_type(type_name) => Ok(SingleValueNode::OpenPropertyAccess {
                source: Box::new(parent),
                name: identifier.to_string(),
            }
            .into()),
            (None, None) => Err(ODataError::UnresolvedIdentifier {
                name: identifier.to_string(),
                parent_type: type_name.to_string(),
                span,
            }),
        }
    }

    fn bind_range_variable(&self, name: &str, span: Span) -> Result<SingleValueNode> {
        self.state
            .find_range_variable(name)
            .map(RangeVariable::reference)
            .ok_or_else(|| ODataError::UnresolvedIdentifier {
                name: name.to_string(),
                parent_type: self.state.implicit_range_variable().type_ref.full_name(),
                span,
            })
    }

    fn bind_lambda(
        &mut self,
        kind: LambdaKind,
        source: &Spanned<QueryToken>,
        parameter: Option<&str>,
        body: Option<&Spanned<QueryToken>>,
        span: Span,
    ) -> Result<SingleValueNode> {
        let collection = match self.bind(source)? {
            QueryNode::Collection(collection) => collection,
            QueryNode::Single(single) => {
                return Err(ODataError::semantic_at(
                    ODU0155,
                    format!(
                        "{}() needs a collection source, found '{}'",
                        kind.keyword(),
                        single.type_ref()
                    ),
                    span,
                ));
            }
        };

        let (variable, body) = match (parameter, body) {
            (Some(name), Some(body)) => {
                let variable = RangeVariable::new(
                    name,
                    collection.element_type(),
                    collection.entity_set().map(str::to_string),
                );
                log::trace!("binding {}() body with range variable {name}", kind.keyword());
                let bound = self.state.with_range_variable(variable.clone(), |state| {
                    MetadataBinder::new(state).bind_single(body)
                })?;
                require_boolean(&bound, "lambda body", body.span)?;
                (Some(variable), Some(Box::new(bound)))
            }
            _ => (None, None),
        };

        let lambda = LambdaNode {
            source: Box::new(collection),
            variable,
            body,
        };
        Ok(match kind {
            LambdaKind::Any => SingleValueNode::Any(lambda),
            LambdaKind::All => SingleValueNode::All(lambda),
        })
    }

    fn bind_type_cast(
        &mut self,
        type_name: &str,
        source: Option<&Spanned<QueryToken>>,
        span: Span,
    ) -> Result<QueryNode> {
        let parent = match source {
            Some(source) => self.bind(source)?,
            None => self.state.implicit_range_variable().reference().into(),
        };
        let model = self.model();
        let target = model.find_type(type_name).ok_or_else(|| unknown_type(type_name, span))?;
        if !target.is_entity() {
            return Err(ODataError::semantic_at(
                ODU0159,
                format!("'{type_name}' is not an entity type and cannot be used as a type segment"),
                span,
            ));
        }

        let source_type = parent.type_ref();
        let derives = source_type
            .element_type()
            .structured_name()
            .is_some_and(|source| model.is_derived_from(type_name, source));
        if !derives || !source_type.element_type().is_entity() {
            return Err(ODataError::Cast {
                source_type: source_type.full_name(),
                target_type: type_name.to_string(),
                span,
            });
        }

        let type_name = type_name.to_string();
        Ok(match parent {
            QueryNode::Single(single) => SingleEntityNode::Cast {
                source: Box::new(single),
                type_name,
            }
            .into(),
            QueryNode::Collection(collection) => CollectionNode::Cast {
                source: Box::new(collection),
                type_name,
            }
            .into(),
        })
    }

    fn bind_count(&mut self, source: &Spanned<QueryToken>, span: Span) -> Result<SingleValueNode> {
        match self.bind(source)? {
            QueryNode::Collection(collection) => Ok(SingleValueNode::Count {
                source: Box::new(collection),
            }),
            QueryNode::Single(single) => Err(ODataError::semantic_at(
                ODU0157,
                format!("$count needs a collection, found '{}'", single.type_ref()),
                span,
            )),
        }
    }

    /// Bind `@name`; the alias value is parsed and bound only to learn its type
    fn bind_parameter_alias(&mut self, name: &str, span: Span) -> Result<SingleValueNode> {
        let Some(text) = self.state.resolve_alias(name) else {
            log::debug!("parameter alias @{name} has no value, binding as untyped");
            return Ok(SingleValueNode::ParameterAlias {
                name: name.to_string(),
                type_ref: EdmTypeRef::Untyped,
            });
        };
        let type_ref = self.state.with_alias(name, span, |state| {
            let token = parse_filter(&text, state.settings())?;
            Ok(MetadataBinder::new(state).bind(&token)?.type_ref())
        })?;
        Ok(SingleValueNode::ParameterAlias {
            name: name.to_string(),
            type_ref,
        })
    }

    fn bind_function_call(
        &mut self,
        name: &str,
        arguments: &[Spanned<QueryToken>],
        source: Option<&Spanned<QueryToken>>,
        span: Span,
    ) -> Result<QueryNode> {
        if source.is_none() {
            if TYPE_FUNCTIONS.contains(&name) {
                return self.bind_type_function(name, arguments, span);
            }
            if is_built_in(name) {
                return self.bind_built_in(name, arguments, span).map(Into::into);
            }
            if !name.contains('.') {
                return Err(ODataError::semantic_at(
                    ODU0158,
                    format!("unknown function '{name}'"),
                    span,
                ));
            }
        }
        self.bind_bound_function(name, arguments, source, span)
    }

    fn bind_built_in(
        &mut self,
        name: &str,
        arguments: &[Spanned<QueryToken>],
        span: Span,
    ) -> Result<SingleValueNode> {
        let values = arguments
            .iter()
            .map(|argument| self.bind_single(argument))
            .collect::<Result<Vec<_>>>()?;
        let types: Vec<EdmTypeRef> = values.iter().map(SingleValueNode::type_ref).collect();
        let argument_types: Vec<ArgumentType<'_>> = values
            .iter()
            .zip(&types)
            .map(|(value, type_ref)| ArgumentType {
                type_ref,
                constant: value.is_constant(),
            })
            .collect();
        let signature = resolve_overload(name, &argument_types, span)?;

        let arguments = values
            .into_iter()
            .zip(&signature.parameters)
            .map(|(value, parameter)| {
                FunctionArgument::positional(value.convert_to(&EdmTypeRef::primitive(*parameter)))
            })
            .collect();
        Ok(SingleValueNode::FunctionCall(FunctionCallNode {
            name: name.to_string(),
            source: None,
            arguments,
            type_ref: signature.return_type.into(),
        }))
    }

    /// `isof([expr,] type)` and `cast([expr,] type)`
    fn bind_type_function(
        &mut self,
        name: &str,
        arguments: &[Spanned<QueryToken>],
        span: Span,
    ) -> Result<QueryNode> {
        let (value, type_argument) = match arguments {
            [type_argument] => (None, type_argument),
            [value, type_argument] => (Some(self.bind_single(value)?), type_argument),
            _ => {
                return Err(ODataError::NoApplicableFunction {
                    name: name.to_string(),
                    arguments: vec![format!("{} arguments", arguments.len())],
                    candidates: vec![format!("{name}(type)"), format!("{name}(expression, type)")],
                    span,
                });
            }
        };

        let type_name = match &type_argument.inner {
            QueryToken::Literal(literal) => match &literal.value {
                LiteralValue::String(text) => text.clone(),
                _ => return Err(expected_type_name(name, type_argument.span)),
            },
            QueryToken::TypeCast {
                type_name,
                source: None,
            } => type_name.clone(),
            _ => return Err(expected_type_name(name, type_argument.span)),
        };
        let target = self
            .model()
            .find_type(&type_name)
            .ok_or_else(|| unknown_type(&type_name, type_argument.span))?;

        let mut call_arguments = Vec::with_capacity(2);
        if let Some(value) = value {
            call_arguments.push(FunctionArgument::positional(value));
        }
        call_arguments.push(FunctionArgument::positional(SingleValueNode::Constant(
            ConstantNode::new(LiteralValue::String(type_name)),
        )));

        let is_cast = name == "cast";
        let call = FunctionCallNode {
            name: name.to_string(),
            source: None,
            arguments: call_arguments,
            type_ref: if is_cast { target.clone() } else { EdmTypeRef::boolean() },
        };
        Ok(if is_cast && target.is_entity() {
            SingleEntityNode::FunctionCall(call).into()
        } else {
            SingleValueNode::FunctionCall(call).into()
        })
    }

    /// `source/NS.Function(p=1)` or `NS.Function(p=1)` bound to `$it`
    fn bind_bound_function(
        &mut self,
        name: &str,
        arguments: &[Spanned<QueryToken>],
        source: Option<&Spanned<QueryToken>>,
        span: Span,
    ) -> Result<QueryNode> {
        let binding = match source {
            Some(source) => self.bind(source)?,
            None => self.state.implicit_range_variable().reference().into(),
        };
        let binding_type = binding.type_ref();
        let model = self.model();
        let functions: Vec<&Operation> = model
            .find_bound_operations(name, &binding_type)
            .into_iter()
            .filter(|op| op.kind == OperationKind::Function && op.return_type.is_some())
            .collect();
        if functions.is_empty() {
            return Err(ODataError::semantic_at(
                ODU0158,
                format!("no function '{name}' is bound to '{binding_type}'"),
                span,
            ));
        }

        let supplied: Vec<(Option<&str>, &Spanned<QueryToken>)> = arguments
            .iter()
            .map(|argument| match &argument.inner {
                QueryToken::NamedArgument { name, value } => (Some(name.as_str()), &**value),
                _ => (None, argument),
            })
            .collect();
        if let Some((repeated, at)) = repeated_argument(arguments) {
            return Err(ODataError::semantic_at(
                ODU0152,
                format!("argument '{repeated}' is supplied more than once to '{name}'"),
                at,
            ));
        }
        let matching: Vec<&Operation> = functions
            .iter()
            .copied()
            .filter(|op| parameters_match(op, &supplied))
            .collect();
        let operation = match matching.as_slice() {
            [only] => *only,
            [] => {
                return Err(ODataError::NoApplicableFunction {
                    name: name.to_string(),
                    arguments: supplied
                        .iter()
                        .map(|(name, _)| name.unwrap_or("_").to_string())
                        .collect(),
                    candidates: functions.iter().map(|op| operation_signature(op)).collect(),
                    span,
                });
            }
            several => {
                return Err(ODataError::AmbiguousBinding {
                    name: name.to_string(),
                    candidates: several.iter().map(|op| operation_signature(op)).collect(),
                    span,
                });
            }
        };

        let parameters = operation.call_parameters();
        let mut bound_arguments = Vec::with_capacity(supplied.len());
        for (index, (argument_name, value)) in supplied.iter().enumerate() {
            let parameter = match argument_name {
                Some(argument_name) => parameters.iter().find(|p| p.name == *argument_name),
                None => parameters.get(index),
            };
            let Some(parameter) = parameter else {
                return Err(ODataError::semantic_at(
                    ODU0152,
                    format!("'{}' has no parameter for argument {}", operation.name, index + 1),
                    value.span,
                ));
            };
            let bound = self.bind_single(value)?;
            let bound = self.coerce_argument(bound, &parameter.type_ref, name, value.span)?;
            bound_arguments.push(FunctionArgument {
                name: argument_name.map(str::to_string),
                value: bound.into(),
            });
        }

        let type_ref = operation.return_type.clone().unwrap_or(EdmTypeRef::Untyped);
        let call = FunctionCallNode {
            name: name.to_string(),
            source: Some(Box::new(binding)),
            arguments: bound_arguments,
            type_ref: type_ref.clone(),
        };
        Ok(match type_ref {
            EdmTypeRef::Collection(_) => CollectionNode::FunctionCall(call).into(),
            EdmTypeRef::Entity(_) => SingleEntityNode::FunctionCall(call).into(),
            _ => SingleValueNode::FunctionCall(call).into(),
        })
    }

    /// Convert an argument to a declared parameter type
    fn coerce_argument(
        &self,
        value: SingleValueNode,
        declared: &EdmTypeRef,
        function: &str,
        span: Span,
    ) -> Result<SingleValueNode> {
        let actual = value.type_ref();
        let accepted = match (&actual, declared) {
            (EdmTypeRef::Untyped, _) => true,
            (EdmTypeRef::Primitive(from), EdmTypeRef::Primitive(to)) => {
                can_promote(*from, *to, value.is_constant())
            }
            (actual, declared) => self.model().is_assignable(actual, declared),
        };
        if !accepted {
            return Err(ODataError::NoApplicableFunction {
                name: function.to_string(),
                arguments: vec![actual.full_name()],
                candidates: vec![declared.full_name()],
                span,
            });
        }
        Ok(value.convert_to(declared))
    }
}

/// Named arguments must name exactly the call parameters; positional ones must match the arity
fn parameters_match(operation: &Operation, supplied: &[(Option<&str>, &Spanned<QueryToken>)]) -> bool {
    let parameters = operation.call_parameters();
    if parameters.len() != supplied.len() {
        return false;
    }
    supplied.iter().all(|(name, _)| match name {
        Some(name) => parameters.iter().any(|p| p.name == *name),
        None => true,
    })
}

/// First named argument whose name already appeared earlier in the call
fn repeated_argument(arguments: &[Spanned<QueryToken>]) -> Option<(&str, Span)> {
    let argument_name: fn(&Spanned<QueryToken>) -> Option<&str> = |argument| match &argument.inner {
        QueryToken::NamedArgument { name, .. } => Some(name.as_str()),
        _ => None,
    };
    arguments.iter().enumerate().find_map(|(index, argument)| {
        let name = argument_name(argument)?;
        arguments[..index]
            .iter()
            .any(|earlier| argument_name(earlier) == Some(name))
            .then_some((name, argument.span))
    })
}

fn operation_signature(operation: &Operation) -> String {
    let parameters: Vec<String> = operation
        .call_parameters()
        .iter()
        .map(|p| format!("{}: {}", p.name, p.type_ref))
        .collect();
    format!("{}({})", operation.name, parameters.join(", "))
}

fn require_boolean(node: &SingleValueNode, what: &str, span: Span) -> Result<()> {
    let type_ref = node.type_ref();
    if type_ref == EdmTypeRef::boolean() || type_ref.is_untyped() {
        Ok(())
    } else {
        Err(ODataError::semantic_at(
            ODU0154,
            format!("{what} must be Edm.Boolean, found '{type_ref}'"),
            span,
        ))
    }
}

fn unknown_type(type_name: &str, span: Span) -> ODataError {
    ODataError::semantic_at(ODU0159, format!("unknown type '{type_name}'"), span)
}

fn expected_type_name(function: &str, span: Span) -> ODataError {
    ODataError::semantic_at(
        ODU0159,
        format!("the last argument of {function}() must be a type name"),
        span,
    )
}
