use foundation::math::Mat4;

/// Model-view stack for one frame. The base is never popped.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    stack: Vec<Mat4>,
}

impl MatrixStack {
    pub fn new(base: Mat4) -> Self {
        Self { stack: vec![base] }
    }

    /// Duplicates the top.
    pub fn push(&mut self) {
        let top = self.top();
        self.stack.push(top);
    }

    /// Returns `false` when only the base is left.
    pub fn pop(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    /// Post-multiplies the top: `top = top * m`.
    pub fn multiply(&mut self, m: Mat4) {
        if let Some(top) = self.stack.last_mut() {
            *top *= m;
        }
    }

    pub fn top(&self) -> Mat4 {
        self.stack.last().copied().unwrap_or(Mat4::IDENTITY)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::math::{Vec3, translation, uniform_scale};

    #[test]
    fn push_multiply_pop_restores_base() {
        let base = translation(Vec3::new(0.0, 0.0, -10.0));
        let mut stack = MatrixStack::new(base);
        stack.push();
        stack.multiply(uniform_scale(2.0));
        assert_eq!(stack.top(), base * uniform_scale(2.0));
        assert_eq!(stack.depth(), 2);
        assert!(stack.pop());
        assert_eq!(stack.top(), base);
        assert!(!stack.pop());
        assert_eq!(stack.depth(), 1);
    }
}
